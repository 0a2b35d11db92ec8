//! Database models

use crate::credentials;
use crate::error::DbError;
use crate::utils::{parse_date, parse_datetime_or_now, parse_optional_datetime};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

const PHONE_DIGITS: RangeInclusive<usize> = 8..=15;
const NATIONAL_ID_DIGITS: RangeInclusive<usize> = 7..=9;

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidUserRole(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidUserRole(s) => write!(f, "Invalid user role: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// User role
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Employee,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Employee, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    /// Only employees carry an active-status flag
    pub fn has_status(&self) -> bool {
        matches!(self, Role::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseError::InvalidUserRole(s.to_string())),
        }
    }
}

/// Password field of a user document.
///
/// `Plain` holds a secret the caller set since the document was loaded and
/// that has not been hashed yet. `Hashed` holds the stored bcrypt hash.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Plain(String),
    Hashed(String),
}

impl Credential {
    /// Whether the caller replaced the password since the last save
    pub fn is_modified(&self) -> bool {
        matches!(self, Credential::Plain(_))
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, Credential::Hashed(_))
    }

    pub(crate) fn expose(&self) -> &str {
        match self {
            Credential::Plain(s) | Credential::Hashed(s) => s,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Plain(_) => f.write_str("Credential::Plain(<redacted>)"),
            Credential::Hashed(_) => f.write_str("Credential::Hashed(<redacted>)"),
        }
    }
}

/// User record without its password, as attached to authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    pub phone_number: String,
    pub username: String,
    pub email: String,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing)]
    pub reset_password_token: Option<String>,
    #[serde(default)]
    pub reset_password_expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub two_factor_code: Option<String>,
    #[serde(default)]
    pub two_factor_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input, password in plaintext
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub last_name: String,
    pub phone_number: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<bool>,
}

impl NewUser {
    /// Build a new, unsaved document: apply defaults, normalize, validate.
    pub fn into_document(self) -> Result<UserDocument, DbError> {
        let role = self.role.unwrap_or_default();
        let mut doc = UserDocument {
            id: None,
            name: self.name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            username: self.username,
            email: self.email,
            password: Credential::Plain(self.password),
            national_id: self.national_id,
            date_of_birth: self.date_of_birth,
            role,
            status: self.status,
            reset_password_token: None,
            reset_password_expires: None,
            two_factor_code: None,
            two_factor_expires: None,
            created_at: None,
            updated_at: None,
        };
        doc.normalize();
        doc.validate()?;
        Ok(doc)
    }
}

/// Full persistable user document
#[derive(Debug, Clone)]
pub struct UserDocument {
    /// `None` until the document is first saved
    pub id: Option<i64>,
    pub name: String,
    pub last_name: String,
    pub phone_number: String,
    pub username: String,
    pub email: String,
    password: Credential,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    pub status: Option<bool>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub two_factor_code: Option<String>,
    pub two_factor_expires: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserDocument {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn credential(&self) -> &Credential {
        &self.password
    }

    /// Replace the password; it is hashed on the next save
    pub fn set_password(&mut self, plain: impl Into<String>) {
        self.password = Credential::Plain(plain.into());
    }

    pub(crate) fn replace_credential(&mut self, credential: Credential) {
        self.password = credential;
    }

    /// Change the role, keeping the status flag consistent with it
    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.status = if role.has_status() {
            self.status.or(Some(true))
        } else {
            None
        };
    }

    /// Trim identifiers, lowercase the email and apply the employee status default
    pub fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.national_id = self.national_id.trim().to_string();
        if self.role.has_status() && self.status.is_none() {
            self.status = Some(true);
        }
    }

    /// Check every field rule; the first failure is returned
    pub fn validate(&self) -> Result<(), DbError> {
        require("name", &self.name)?;
        require("lastName", &self.last_name)?;
        require("phoneNumber", &self.phone_number)?;
        require("username", &self.username)?;
        require("email", &self.email)?;
        require("password", self.password.expose())?;
        require("nationalId", &self.national_id)?;

        if !is_digits(&self.phone_number, PHONE_DIGITS) {
            return Err(DbError::Validation(
                "El TELEFONO debe contener entre 8 y 15 dígitos numéricos.".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(DbError::Validation(
                "Por favor, introduce un email válido".to_string(),
            ));
        }
        if !is_digits(&self.national_id, NATIONAL_ID_DIGITS) {
            return Err(DbError::Validation(
                "El DNI debe contener entre 7 y 9 dígitos numéricos.".to_string(),
            ));
        }

        match (self.role.has_status(), self.status) {
            (true, None) => Err(DbError::Validation(
                "El campo status es obligatorio para empleados".to_string(),
            )),
            (false, Some(_)) => Err(DbError::Validation(format!(
                "El campo status no aplica al rol {}",
                self.role
            ))),
            _ => Ok(()),
        }
    }

    /// Compare a plaintext candidate against the stored hash
    pub async fn match_password(&self, candidate: &str) -> Result<bool, DbError> {
        credentials::match_password(candidate, &self.password).await
    }

    /// Password-less projection; `None` while the document is unsaved
    pub fn to_user(&self) -> Option<User> {
        Some(User {
            id: self.id?,
            name: self.name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            national_id: self.national_id.clone(),
            date_of_birth: self.date_of_birth,
            role: self.role,
            status: self.status,
            reset_password_token: self.reset_password_token.clone(),
            reset_password_expires: self.reset_password_expires,
            two_factor_code: self.two_factor_code.clone(),
            two_factor_expires: self.two_factor_expires,
            created_at: self.created_at?,
            updated_at: self.updated_at?,
        })
    }
}

/// Identifiers are trimmed by `normalize`; other fields are checked as given
fn require(field: &str, value: &str) -> Result<(), DbError> {
    if value.is_empty() {
        return Err(DbError::Validation(format!(
            "El campo {} es obligatorio",
            field
        )));
    }
    Ok(())
}

fn is_digits(value: &str, len: RangeInclusive<usize>) -> bool {
    len.contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

/// Matches `.+@.+\..+`: something, an `@`, something, a dot, something
fn is_valid_email(email: &str) -> bool {
    email
        .char_indices()
        .filter(|&(_, c)| c == '@')
        .any(|(at, _)| {
            let domain = &email[at + 1..];
            at > 0
                && domain
                    .char_indices()
                    .any(|(dot, c)| c == '.' && dot > 0 && dot + 1 < domain.len())
        })
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let role_str: String = row.try_get("role")?;
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            last_name: row.try_get("last_name")?,
            phone_number: row.try_get("phone_number")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            national_id: row.try_get("national_id")?,
            date_of_birth: parse_date(&row.try_get::<String, _>("date_of_birth")?)?,
            role: Role::from_str(&role_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            status: row.try_get("status")?,
            reset_password_token: row.try_get("reset_password_token")?,
            reset_password_expires: parse_optional_datetime(row.try_get("reset_password_expires")?),
            two_factor_code: row.try_get("two_factor_code")?,
            two_factor_expires: parse_optional_datetime(row.try_get("two_factor_expires")?),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for UserDocument {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let user = User::try_from(row)?;
        Ok(UserDocument {
            id: Some(user.id),
            name: user.name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            username: user.username,
            email: user.email,
            password: Credential::Hashed(row.try_get("password_hash")?),
            national_id: user.national_id,
            date_of_birth: user.date_of_birth,
            role: user.role,
            status: user.status,
            reset_password_token: user.reset_password_token,
            reset_password_expires: user.reset_password_expires,
            two_factor_code: user.two_factor_code,
            two_factor_expires: user.two_factor_expires,
            created_at: Some(user.created_at),
            updated_at: Some(user.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(role: Option<Role>, status: Option<bool>) -> NewUser {
        NewUser {
            name: "Lucía".to_string(),
            last_name: "Fernández".to_string(),
            phone_number: "1155667788".to_string(),
            username: "  lucia  ".to_string(),
            email: " Lucia@Example.COM ".to_string(),
            password: "s3cret-pass".to_string(),
            national_id: " 30123456 ".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
            role,
            status,
        }
    }

    fn validation_message(err: DbError) -> String {
        match err {
            DbError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_role_round_trip_strings() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("superuser").is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Employee).unwrap(), r#""employee""#);
        let role: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_into_document_normalizes_fields() {
        let doc = new_user(None, None).into_document().unwrap();

        assert!(doc.is_new());
        assert_eq!(doc.username, "lucia");
        assert_eq!(doc.email, "lucia@example.com");
        assert_eq!(doc.national_id, "30123456");
        assert_eq!(doc.role, Role::User);
        assert_eq!(doc.status, None);
        assert!(doc.credential().is_modified());
        assert!(doc.reset_password_token.is_none());
        assert!(doc.two_factor_code.is_none());
    }

    #[test]
    fn test_employee_status_defaults_to_true() {
        let doc = new_user(Some(Role::Employee), None).into_document().unwrap();
        assert_eq!(doc.status, Some(true));

        let doc = new_user(Some(Role::Employee), Some(false))
            .into_document()
            .unwrap();
        assert_eq!(doc.status, Some(false));
    }

    #[test]
    fn test_status_rejected_for_non_employees() {
        let err = new_user(Some(Role::Admin), Some(true))
            .into_document()
            .unwrap_err();
        assert!(validation_message(err).contains("status"));
    }

    #[test]
    fn test_set_role_keeps_status_consistent() {
        let mut doc = new_user(None, None).into_document().unwrap();

        doc.set_role(Role::Employee);
        assert_eq!(doc.status, Some(true));
        assert!(doc.validate().is_ok());

        doc.set_role(Role::Admin);
        assert_eq!(doc.status, None);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_phone_number_rules() {
        for phone in ["1234567", "1234567890123456", "12345abc9", "+5491155667788"] {
            let mut user = new_user(None, None);
            user.phone_number = phone.to_string();
            let err = user.into_document().unwrap_err();
            assert!(validation_message(err).contains("TELEFONO"), "{phone}");
        }

        let mut user = new_user(None, None);
        user.phone_number = "123456789012345".to_string();
        assert!(user.into_document().is_ok());
    }

    #[test]
    fn test_national_id_rules() {
        for dni in ["123456", "1234567890", "12.345.678"] {
            let mut user = new_user(None, None);
            user.national_id = dni.to_string();
            let err = user.into_document().unwrap_err();
            assert!(validation_message(err).contains("DNI"), "{dni}");
        }

        let mut user = new_user(None, None);
        user.national_id = "1234567".to_string();
        assert!(user.into_document().is_ok());
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.c"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("@b.c"));
        assert!(!is_valid_email("a@.c"));
        assert!(!is_valid_email("a@b."));
        assert!(!is_valid_email("a.b.c"));
        assert!(!is_valid_email("plainaddress"));

        let mut user = new_user(None, None);
        user.email = "not-an-email".to_string();
        let err = user.into_document().unwrap_err();
        assert_eq!(validation_message(err), "Por favor, introduce un email válido");
    }

    #[test]
    fn test_required_fields() {
        let mut user = new_user(None, None);
        user.name = String::new();
        assert!(validation_message(user.into_document().unwrap_err()).contains("name"));

        let mut user = new_user(None, None);
        user.last_name = "   ".to_string();
        assert!(user.into_document().is_ok());

        let mut user = new_user(None, None);
        user.username = "   ".to_string();
        assert!(validation_message(user.into_document().unwrap_err()).contains("username"));

        let mut user = new_user(None, None);
        user.password = String::new();
        assert!(validation_message(user.into_document().unwrap_err()).contains("password"));
    }

    #[test]
    fn test_unsaved_document_has_no_projection() {
        let doc = new_user(None, None).into_document().unwrap();
        assert!(doc.to_user().is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::Plain("hunter22".to_string());
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: 7,
            name: "Ana".to_string(),
            last_name: "Gómez".to_string(),
            phone_number: "1144556677".to_string(),
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            national_id: "28999111".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 1, 30).unwrap(),
            role: Role::Employee,
            status: Some(true),
            reset_password_token: Some("reset-abc".to_string()),
            reset_password_expires: None,
            two_factor_code: Some("123456".to_string()),
            two_factor_expires: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains(r#""role":"employee""#));
        assert!(json.contains(r#""lastName":"Gómez""#));
        assert!(!json.contains("reset-abc"));
        assert!(!json.contains("123456\""));
        assert!(!json.contains("password"));
    }
}
