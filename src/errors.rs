use axum::{http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub fields: FieldErrors,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn invalid_fields(fields: FieldErrors) -> Self {
        Self {
            fields,
            ..Self::bad_request("Please fix the highlighted fields")
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: &'a FieldErrors,
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error: &self.message,
            fields: &self.fields,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Failures reported by the account provider, each with the text shown to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("The email address is not valid (name@example.com)")]
    InvalidEmail,

    #[error("That email is already in use")]
    EmailInUse,

    #[error("Wrong email or password")]
    WrongCredentials,

    #[error("Your email is not verified. Check your inbox and confirm it before signing in.")]
    EmailNotVerified,

    #[error("Too many failed attempts. Try again later.")]
    TooManyRequests,

    #[error("The link is invalid or has already been used")]
    InvalidToken,

    #[error("You need to sign in first")]
    NotAuthenticated,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail | AuthError::InvalidToken => StatusCode::BAD_REQUEST,
            AuthError::EmailInUse => StatusCode::CONFLICT,
            AuthError::WrongCredentials | AuthError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotVerified => StatusCode::FORBIDDEN,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Form field the error belongs to, when it belongs to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AuthError::InvalidEmail | AuthError::EmailInUse => Some("email"),
            _ => None,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let mut error = AppError::new(err.status(), err.to_string());
        if let Some(field) = err.field() {
            error.fields.insert(field, err.to_string());
        }
        error
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_status_and_field() {
        let err = AppError::from(AuthError::EmailInUse);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.fields.get("email").map(String::as_str), Some("That email is already in use"));

        let err = AppError::from(AuthError::TooManyRequests);
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(err.fields.is_empty());
    }
}
