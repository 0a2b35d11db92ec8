//! User lookup used by the authentication middleware

use async_trait::async_trait;
use gatekeeper_db::{Database, DbError, User};

/// Resolves a verified subject identifier to a user record
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by primary key; the password is never loaded
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, DbError>;
}

#[async_trait]
impl UserDirectory for Database {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        Database::find_user_by_id(self, id).await
    }
}
