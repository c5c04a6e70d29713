//! Error types for Schoolhouse

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Inactive user")]
    InactiveUser,

    #[error("Not authenticated")]
    MissingToken,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Inactive admin account")]
    InactiveAccount,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    LastPrincipal(&'static str),

    #[error("Too many login attempts. Try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    Other(String),
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for Error {
    fn from(rejection: FormRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl Error {
    /// HTTP status this error maps to at the API boundary
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::MissingToken | Error::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Error::InactiveAccount | Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InactiveUser
            | Error::Validation(_)
            | Error::Conflict(_)
            | Error::LastPrincipal(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Config(_)
            | Error::Io(_)
            | Error::TomlParse(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::Token(_)
            | Error::PasswordHash(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "unhandled failure");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(ErrorBody { detail })).into_response();

        match self {
            Error::InvalidCredentials | Error::MissingToken | Error::InvalidToken => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Error::RateLimited { retry_after_secs } => {
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            _ => {}
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::InactiveUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::InactiveAccount.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::NotFound("Student").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::RateLimited { retry_after_secs: 12 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            Error::Other("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(Error::NotFound("Student").to_string(), "Student not found");
    }

    #[test]
    fn test_unauthorized_sets_www_authenticate() {
        let response = Error::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = Error::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
