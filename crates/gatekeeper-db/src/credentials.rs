//! Password hashing lifecycle for user documents

use tracing::debug;

use crate::error::DbError;
use crate::models::{Credential, UserDocument};

/// bcrypt work factor for stored passwords
pub const HASH_COST: u32 = 10;

/// Runs before every write of a user document.
///
/// An existing document whose password was not touched passes through
/// unchanged. Otherwise the password is hashed with a fresh salt, so the
/// returned document never carries the plaintext.
pub async fn prepare_for_save(mut doc: UserDocument) -> Result<UserDocument, DbError> {
    if !doc.credential().is_modified() && !doc.is_new() {
        debug!("Password unchanged for user {:?}, skipping hash", doc.id);
        return Ok(doc);
    }

    let hashed = hash_password(doc.credential().expose().to_string()).await?;
    doc.replace_credential(Credential::Hashed(hashed));
    debug!("Password hashed for user {}", doc.username);
    Ok(doc)
}

/// Hash a password with a fresh random salt on the blocking pool
pub async fn hash_password(plain: String) -> Result<String, DbError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, HASH_COST))
        .await
        .map_err(|e| DbError::PasswordHash(e.to_string()))?
        .map_err(|e| DbError::PasswordHash(e.to_string()))
}

/// Compare a plaintext candidate against a credential.
///
/// A credential that has not been hashed yet never matches.
pub async fn match_password(candidate: &str, credential: &Credential) -> Result<bool, DbError> {
    let Credential::Hashed(hash) = credential else {
        return Ok(false);
    };

    let candidate = candidate.to_string();
    let hash = hash.clone();
    tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash))
        .await
        .map_err(|e| DbError::PasswordHash(e.to_string()))?
        .map_err(|e| DbError::PasswordHash(e.to_string()))
}
