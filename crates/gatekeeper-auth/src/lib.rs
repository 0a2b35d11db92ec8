//! Gatekeeper Authentication and Authorization
//!
//! This crate verifies bearer JWTs, resolves them to stored users, and
//! gates axum routes by role.

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod store;

pub use error::AuthError;
pub use jwt::{JwtVerifier, SubjectId, TokenClaims};
pub use middleware::{AuthGate, AuthUser, RoleGuard, authenticate, authorize, bearer_token, require_role};
pub use store::UserDirectory;
