//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures of the authentication and authorization gates.
///
/// The three authentication failures share status 401 and differ only in
/// their message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("No autorizado, no hay token")]
    MissingCredential,

    #[error("No autorizado, token fallido o expirado")]
    InvalidOrExpiredCredential,

    #[error("No autorizado, usuario no encontrado")]
    UnknownSubject,

    #[error("Acceso denegado, no tienes el rol requerido")]
    InsufficientRole,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidOrExpiredCredential
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = axum::Json(json!({
            "message": self.to_string()
        }));

        (self.status(), body).into_response()
    }
}
