use service_core::error::AppError;
use thiserror::Error;

use crate::utils::crypto::CryptoError;

/// Business-rule failure taxonomy for the credential subsystem.
///
/// Authentication variants that carry enumeration risk map to deliberately
/// vague HTTP messages. Authorization-state variants (blocked, deleted) are
/// specific: they are only reported after the caller has proven knowledge
/// of valid credentials.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store round-trip exceeded the configured deadline. Transient; the
    /// caller may retry.
    #[error("Store timeout during {0}")]
    Timeout(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Email already registered")]
    EmailExists,

    #[error("Phone number already registered")]
    PhoneExists,

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Fraud log entry not found")]
    FraudLogNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is blocked")]
    UserBlocked,

    #[error("Account has been deleted")]
    UserDeleted,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid or expired code")]
    InvalidOtp,

    #[error("Please wait before requesting another code")]
    OtpCooldown { retry_after_seconds: u64 },

    #[error("Current password is incorrect")]
    InvalidPassword,

    #[error("Failed to send email: {0}")]
    EmailSendFailed(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Timeout(op) => AppError::Timeout(op),
            ServiceError::Crypto(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::EmailExists => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::PhoneExists => {
                AppError::Conflict(anyhow::anyhow!("Phone number already registered"))
            }
            ServiceError::InvalidRole(role) => {
                AppError::BadRequest(anyhow::anyhow!("Unknown role: {}", role))
            }
            ServiceError::InvalidDestination(msg) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid destination: {}", msg))
            }
            ServiceError::FraudLogNotFound => {
                AppError::NotFound(anyhow::anyhow!("Fraud log entry not found"))
            }
            // One uniform message whether the email was unknown or the
            // password wrong: no account enumeration through login.
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid email or password"))
            }
            ServiceError::UserBlocked => {
                AppError::Forbidden(anyhow::anyhow!("Account is blocked"))
            }
            ServiceError::UserDeleted => {
                AppError::Forbidden(anyhow::anyhow!("Account has been deleted"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::InvalidToken => {
                AppError::AuthError(anyhow::anyhow!("Invalid token"))
            }
            ServiceError::TokenExpired => {
                AppError::AuthError(anyhow::anyhow!("Token expired"))
            }
            ServiceError::InvalidOtp => {
                AppError::AuthError(anyhow::anyhow!("Invalid or expired code"))
            }
            ServiceError::OtpCooldown {
                retry_after_seconds,
            } => AppError::TooManyRequests(
                "Please wait before requesting another code".to_string(),
                Some(retry_after_seconds),
            ),
            ServiceError::InvalidPassword => {
                AppError::AuthError(anyhow::anyhow!("Current password is incorrect"))
            }
            ServiceError::EmailSendFailed(msg) => AppError::EmailError(msg),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
