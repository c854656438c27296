//! Application error types for vicdan
//!
//! This module defines the error types used throughout the application.
//! All error types use `thiserror`; `ApiError` is the only one that knows
//! about HTTP and maps every failure onto a status code and JSON body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Authentication-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Invalid, tampered or expired token
    #[error("Invalid token")]
    InvalidToken,

    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Rate limited due to too many failed attempts
    #[error("Rate limited: too many failed attempts")]
    RateLimited,

    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingAuth,

    /// Registration with an email that already has an account
    #[error("Email already registered")]
    EmailTaken,

    /// Request body failed schema validation
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Storage or hashing failure behind an auth operation
    #[error("Internal auth error: {0}")]
    Internal(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The background connection failed or was closed
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Stored JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => {
                    DbError::ConstraintViolation(e.to_string())
                }
                _ => DbError::Sqlite(e),
            },
            other => DbError::Connection(other.to_string()),
        }
    }
}

/// Asset storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error while reading or writing an asset
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Key that would escape the storage root or is empty
    #[error("Invalid asset key: {0}")]
    InvalidKey(String),
}

/// Profile management errors
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Profile does not exist (or is not visible through this path)
    #[error("Profile not found")]
    NotFound,

    /// Profile belongs to another administrator
    #[error("Profile belongs to another administrator")]
    Forbidden,

    /// Profile has already been published
    #[error("Profile is already published")]
    AlreadyPublished,

    /// Requested state change is not allowed
    #[error("Invalid state change: {0}")]
    InvalidState(String),

    /// Request body failed schema validation
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// QR code could not be rendered
    #[error("QR generation failed: {0}")]
    Qr(String),

    /// Asset storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// HTTP-facing error returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request
    #[error("{0}")]
    BadRequest(String),

    /// Schema violations, one message per offending field
    #[error("Validation failed")]
    Validation(Vec<String>),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// State conflict (duplicate email, already published)
    #[error("{0}")]
    Conflict(String),

    /// Too many failed login attempts
    #[error("Too many failed attempts. Please try again later.")]
    RateLimited,

    /// Storage or query failure; the string is a short diagnostic
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(details) => serde_json::json!({
                "error": self.to_string(),
                "details": details,
            }),
            ApiError::Internal(detail) => serde_json::json!({
                "error": self.to_string(),
                "detail": detail,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => ApiError::Unauthorized("Invalid token".to_string()),
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::MissingAuth => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::RateLimited => ApiError::RateLimited,
            AuthError::EmailTaken => ApiError::Conflict("Email already registered".to_string()),
            AuthError::Validation(details) => ApiError::Validation(details),
            AuthError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => ApiError::NotFound("Profile not found".to_string()),
            ProfileError::Forbidden => ApiError::Forbidden,
            ProfileError::AlreadyPublished => {
                ApiError::Conflict("Profile is already published".to_string())
            }
            ProfileError::InvalidState(msg) => ApiError::Conflict(msg),
            ProfileError::Validation(details) => ApiError::Validation(details),
            ProfileError::Qr(e) => {
                tracing::error!(error = %e, "QR generation failed");
                ApiError::Internal("failed to generate QR code".to_string())
            }
            ProfileError::Storage(e) => {
                tracing::error!(error = %e, "Asset storage failed");
                ApiError::Internal("failed to store asset".to_string())
            }
            ProfileError::Database(e) => {
                tracing::error!(error = %e, "Profile query failed");
                ApiError::Internal("database query failed".to_string())
            }
        }
    }
}
