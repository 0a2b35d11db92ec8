//! User operations

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, info};

use crate::credentials::prepare_for_save;
use crate::error::DbError;
use crate::models::{User, UserDocument};
use crate::repository::Database;
use crate::utils::DATE_FORMAT;

/// Columns of the password-less projection
const USER_COLUMNS: &str = "id, name, last_name, phone_number, username, email, national_id, \
    date_of_birth, role, status, reset_password_token, reset_password_expires, \
    two_factor_code, two_factor_expires, created_at, updated_at";

/// Fields guarded by a UNIQUE constraint
const UNIQUE_FIELDS: [&str; 3] = ["username", "email", "national_id"];

/// Translate a UNIQUE constraint failure into a duplicate error naming the field
fn map_unique_violation(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        let field = UNIQUE_FIELDS
            .into_iter()
            .find(|field| db_err.message().contains(&format!("users.{}", field)))
            .unwrap_or("user");
        return DbError::Duplicate(format!("{} already exists", field));
    }
    DbError::from(err)
}

impl Database {
    // ==================== User Operations ====================

    /// Persist a user document, inserting it when new.
    ///
    /// The document is normalized, validated and passed through
    /// [`prepare_for_save`] before every write; the returned document
    /// carries the stored state.
    pub async fn save_user(&self, mut doc: UserDocument) -> Result<UserDocument, DbError> {
        doc.normalize();
        doc.validate()?;
        let mut doc = prepare_for_save(doc).await?;
        let now = Utc::now();
        let existing_id = doc.id;

        match existing_id {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO users (name, last_name, phone_number, username, email, password_hash,
                        national_id, date_of_birth, role, status, reset_password_token,
                        reset_password_expires, two_factor_code, two_factor_expires, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING id
                    "#,
                )
                .bind(&doc.name)
                .bind(&doc.last_name)
                .bind(&doc.phone_number)
                .bind(&doc.username)
                .bind(&doc.email)
                .bind(doc.credential().expose())
                .bind(&doc.national_id)
                .bind(doc.date_of_birth.format(DATE_FORMAT).to_string())
                .bind(doc.role.as_str())
                .bind(doc.status)
                .bind(&doc.reset_password_token)
                .bind(doc.reset_password_expires.map(|t| t.to_rfc3339()))
                .bind(&doc.two_factor_code)
                .bind(doc.two_factor_expires.map(|t| t.to_rfc3339()))
                .bind(now.to_rfc3339())
                .bind(now.to_rfc3339())
                .fetch_one(&self.pool)
                .await
                .map_err(map_unique_violation)?;

                let id: i64 = result.get("id");
                doc.id = Some(id);
                doc.created_at = Some(now);
                info!("Created user {} ({})", doc.username, id);
            }
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET name = ?, last_name = ?, phone_number = ?, username = ?, email = ?,
                        password_hash = ?, national_id = ?, date_of_birth = ?, role = ?, status = ?,
                        reset_password_token = ?, reset_password_expires = ?,
                        two_factor_code = ?, two_factor_expires = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&doc.name)
                .bind(&doc.last_name)
                .bind(&doc.phone_number)
                .bind(&doc.username)
                .bind(&doc.email)
                .bind(doc.credential().expose())
                .bind(&doc.national_id)
                .bind(doc.date_of_birth.format(DATE_FORMAT).to_string())
                .bind(doc.role.as_str())
                .bind(doc.status)
                .bind(&doc.reset_password_token)
                .bind(doc.reset_password_expires.map(|t| t.to_rfc3339()))
                .bind(&doc.two_factor_code)
                .bind(doc.two_factor_expires.map(|t| t.to_rfc3339()))
                .bind(now.to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_unique_violation)?;

                if result.rows_affected() == 0 {
                    return Err(DbError::NotFound(format!("User {}", id)));
                }
                debug!("Updated user {} ({})", doc.username, id);
            }
        }

        doc.updated_at = Some(now);
        Ok(doc)
    }

    /// Get a user by ID, without the password
    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get the full document for a user by ID
    pub async fn get_user_document(&self, id: i64) -> Result<Option<UserDocument>, DbError> {
        let sql = format!("SELECT {}, password_hash FROM users WHERE id = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| UserDocument::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get the full document for a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDocument>, DbError> {
        let sql = format!("SELECT {}, password_hash FROM users WHERE username = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| UserDocument::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get the full document for a user by email (case-insensitive)
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDocument>, DbError> {
        let sql = format!("SELECT {}, password_hash FROM users WHERE email = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| UserDocument::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Delete a user
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
