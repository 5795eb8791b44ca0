//! HTTP mapping of the business-rule error taxonomy.
//!
//! Authentication failures with enumeration risk must stay vague and share
//! a status; authorization-state failures are specific; cooldowns carry
//! Retry-After; store timeouts map to a transient status retryable by the
//! caller.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use auth_service::services::{ServiceError, NEUTRAL_RESET_MESSAGE};
use service_core::error::AppError;

fn status_of(err: ServiceError) -> StatusCode {
    AppError::from(err).into_response().status()
}

#[test]
fn invalid_credentials_is_401() {
    assert_eq!(status_of(ServiceError::InvalidCredentials), StatusCode::UNAUTHORIZED);
}

#[test]
fn credentials_message_is_uniform() {
    // The public message must not distinguish unknown email from wrong
    // password.
    let err = AppError::from(ServiceError::InvalidCredentials);
    assert_eq!(err.to_string(), "Authentication error: Invalid email or password");
}

#[test]
fn account_state_errors_are_specific_and_forbidden() {
    assert_eq!(status_of(ServiceError::UserBlocked), StatusCode::FORBIDDEN);
    assert_eq!(status_of(ServiceError::UserDeleted), StatusCode::FORBIDDEN);

    let blocked = AppError::from(ServiceError::UserBlocked).to_string();
    let deleted = AppError::from(ServiceError::UserDeleted).to_string();
    assert_ne!(blocked, deleted);
}

#[test]
fn conflicts_are_409() {
    assert_eq!(status_of(ServiceError::EmailExists), StatusCode::CONFLICT);
    assert_eq!(status_of(ServiceError::PhoneExists), StatusCode::CONFLICT);
}

#[test]
fn token_errors_are_401_but_distinguishable() {
    assert_eq!(status_of(ServiceError::InvalidToken), StatusCode::UNAUTHORIZED);
    assert_eq!(status_of(ServiceError::TokenExpired), StatusCode::UNAUTHORIZED);

    let invalid = AppError::from(ServiceError::InvalidToken).to_string();
    let expired = AppError::from(ServiceError::TokenExpired).to_string();
    assert_ne!(invalid, expired);
}

#[test]
fn otp_cooldown_is_429_with_retry_after() {
    let response = AppError::from(ServiceError::OtpCooldown {
        retry_after_seconds: 42,
    })
    .into_response();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    assert_eq!(retry_after.as_deref(), Some("42"));
}

#[test]
fn invalid_otp_is_401_and_vague() {
    assert_eq!(status_of(ServiceError::InvalidOtp), StatusCode::UNAUTHORIZED);
    // One message for wrong, expired, exhausted and replayed codes.
    let err = AppError::from(ServiceError::InvalidOtp);
    assert_eq!(err.to_string(), "Authentication error: Invalid or expired code");
}

#[test]
fn store_timeout_is_transient() {
    let status = status_of(ServiceError::Timeout("find_user_by_email".to_string()));
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[test]
fn unknown_role_is_400() {
    assert_eq!(
        status_of(ServiceError::InvalidRole("superuser".to_string())),
        StatusCode::BAD_REQUEST
    );
}

#[test]
fn neutral_reset_message_mentions_no_account_state() {
    // The message must read the same whether or not the account exists.
    assert!(!NEUTRAL_RESET_MESSAGE.to_lowercase().contains("not found"));
    assert!(!NEUTRAL_RESET_MESSAGE.to_lowercase().contains("unknown"));
}
