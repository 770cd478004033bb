//! Error types for webhub.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Authentication credentials were not provided")]
    NotAuthenticated,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    // Resource errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // External service errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 403: session authentication never answers 401
            Self::NotAuthenticated | Self::Forbidden => StatusCode::FORBIDDEN,

            // 404
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 409
            Self::AlreadyExists(_) => StatusCode::CONFLICT,

            // 400
            Self::Validation(_)
            | Self::InvalidInput(_)
            | Self::InvalidToken
            | Self::InvalidCredentials => StatusCode::BAD_REQUEST,

            // 502
            Self::Mail(_) => StatusCode::BAD_GATEWAY,

            // 500
            Self::Database(_) | Self::Internal(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Mail(_) => "MAIL_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }

    /// Map a write failure, turning constraint violations into client errors.
    pub fn from_write(err: sqlx::Error, what: &str) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Self::AlreadyExists(what.to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                Self::Validation(format!("{} references a missing record", what))
            }
            sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
                Self::Validation(format!("{} violates a field constraint", what))
            }
            _ => Self::Database(err),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON with missing or mistyped fields
            JsonRejection::JsonDataError(e) => Self::Validation(e.body_text()),
            other => Self::InvalidInput(other.body_text()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_maps_to_forbidden() {
        assert_eq!(Error::NotAuthenticated.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(
            Error::NotFound("post 9".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::AlreadyExists("user".into()).error_code(),
            "ALREADY_EXISTS"
        );
    }
}
