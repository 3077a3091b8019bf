use service_core::error::AppError;
use thiserror::Error;

use crate::utils::PasswordError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, expired, revoked, or orphaned bearer token.
    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Permission denied")]
    PermissionDenied,

    /// Also returned for records that exist but belong to someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("No {kind} with the code name \"{code}\" was found")]
    UnknownCode { kind: &'static str, code: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity store did not respond in time")]
    StoreTimeout,

    /// Stored data that can't be interpreted, e.g. a corrupt password hash.
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::MalformedHash(e) => ServiceError::Integrity(e.to_string()),
            PasswordError::Hashing(e) => {
                ServiceError::Internal(anyhow::anyhow!("Password hashing failed: {}", e))
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Redis(e) => AppError::RedisError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::TokenInvalid => {
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::PermissionDenied => {
                AppError::Forbidden(anyhow::anyhow!("Permission denied"))
            }
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            e @ ServiceError::UnknownCode { .. } => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::StoreTimeout => {
                AppError::ServiceUnavailable("Identity store timed out".to_string())
            }
            ServiceError::Integrity(msg) => {
                AppError::InternalError(anyhow::anyhow!("Data integrity error: {}", msg))
            }
        }
    }
}
