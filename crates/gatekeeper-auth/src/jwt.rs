//! JWT token verification

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Subject identifier embedded by the token issuer.
///
/// Issuers may encode the user's primary key as a number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Numeric(i64),
    Text(String),
}

impl SubjectId {
    /// The user primary key, if the identifier is one
    pub fn as_user_id(&self) -> Option<i64> {
        match self {
            SubjectId::Numeric(id) => Some(*id),
            SubjectId::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub id: SubjectId,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verifies HS256 tokens against a single secret
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for the given secret
    pub fn new(secret: &str) -> Self {
        Self::from_secret(Some(secret))
    }

    /// A verifier with no secret; every token is rejected
    pub fn unconfigured() -> Self {
        Self::from_secret(None)
    }

    /// Create a verifier from an optional secret. An empty secret counts as absent.
    pub fn from_secret(secret: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            decoding_key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.decoding_key.is_some()
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let Some(decoding_key) = &self.decoding_key else {
            debug!("No verification secret configured, rejecting token");
            return Err(AuthError::InvalidOrExpiredCredential);
        };

        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredCredential);
        }

        let token_data = decode::<TokenClaims>(token, decoding_key, &self.validation)
            .inspect_err(|e| debug!("Token rejected: {}", e))?;

        Ok(token_data.claims)
    }
}
