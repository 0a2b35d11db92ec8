//! Authentication middleware for Axum

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use gatekeeper_db::{Role, User};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::jwt::JwtVerifier;
use crate::store::UserDirectory;

/// Authorization scheme prefix
pub const BEARER: &str = "Bearer";

/// Extract the token from an authorization header.
///
/// Returns `None` when the header does not use the bearer scheme. A header
/// that does but carries no second segment yields an empty token.
pub fn bearer_token(header: &str) -> Option<&str> {
    if !header.starts_with(BEARER) {
        return None;
    }
    Some(header.split(' ').nth(1).unwrap_or(""))
}

/// Token verification plus user lookup, shared by every protected route
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<JwtVerifier>,
    directory: Arc<dyn UserDirectory>,
}

impl AuthGate {
    pub fn new(verifier: JwtVerifier, directory: impl UserDirectory + 'static) -> Self {
        Self {
            verifier: Arc::new(verifier),
            directory: Arc::new(directory),
        }
    }

    /// Resolve the authorization header to the user it identifies
    pub async fn resolve(&self, header: Option<&str>) -> Result<User, AuthError> {
        debug!("Authorization header present: {}", header.is_some());

        let token = header
            .and_then(bearer_token)
            .ok_or(AuthError::MissingCredential)?;

        let preview: String = token.chars().take(10).collect();
        debug!("Verifying token {}...", preview);

        let claims = self.verifier.verify(token)?;
        debug!("Token subject: {:?}", claims.id);

        let id = claims
            .id
            .as_user_id()
            .ok_or(AuthError::InvalidOrExpiredCredential)?;

        match self.directory.find_user_by_id(id).await {
            Ok(Some(user)) => {
                debug!("Authenticated user: {} ({})", user.username, user.role);
                Ok(user)
            }
            Ok(None) => {
                debug!("No user with id {}", id);
                Err(AuthError::UnknownSubject)
            }
            Err(e) => {
                warn!("User lookup failed for id {}: {}", id, e);
                Err(AuthError::InvalidOrExpiredCredential)
            }
        }
    }
}

/// Authenticated user attached to the request
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingCredential)
    }
}

/// Authentication middleware
///
/// Requires a valid bearer token naming an existing user. On success the
/// user is added to request extensions as [`AuthUser`]; otherwise the
/// request is answered with 401 and the inner service never runs.
pub async fn authenticate(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let user = gate.resolve(header.as_deref()).await?;
    request.extensions_mut().insert(AuthUser(user));

    Ok(next.run(request).await)
}

/// Set of roles admitted by a route
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Vec<Role>,
}

impl RoleGuard {
    pub fn permits(&self, user: Option<&User>) -> bool {
        user.is_some_and(|u| self.allowed.contains(&u.role))
    }

    pub fn roles(&self) -> &[Role] {
        &self.allowed
    }
}

/// Build a guard admitting only the given roles
pub fn authorize(roles: impl IntoIterator<Item = Role>) -> RoleGuard {
    RoleGuard {
        allowed: roles.into_iter().collect(),
    }
}

/// Middleware to require one of the guard's roles
///
/// Must run after [`authenticate`]. A request without an attached user is
/// refused with 403.
pub async fn require_role(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request.extensions().get::<AuthUser>().map(|u| &u.0);

    if !guard.permits(user) {
        debug!(
            "Role check failed: user role {:?}, allowed {:?}",
            user.map(|u| u.role),
            guard.roles()
        );
        return Err(AuthError::InsufficientRole);
    }

    Ok(next.run(request).await)
}
