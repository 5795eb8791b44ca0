//! Authentication handlers.
//!
//! Thin shells over the auth orchestrator: extract, validate, delegate,
//! map errors. No business rules live here.

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{LoginRequest, RegisterRequest};
use crate::services::{AuthResponse, TokenPair};
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Best-effort client address: load-balancer header first, then the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 409, description = "Email or phone already registered"),
        (status = 422, description = "Validation error")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    let response = state.auth.register(req, ip).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email and password.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account blocked or deleted")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    let response = state.auth.login(req, ip).await?;
    Ok(Json(response))
}

/// Rotate a refresh token into a new token pair.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// Revoke one refresh token.
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses((status = 200, description = "Logged out", body = MessageResponse)),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    state.auth.logout(&req.refresh_token, ip).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Start a password reset. The response never reveals whether the email
/// exists.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Neutral acknowledgement", body = MessageResponse)),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    let message = state.auth.forgot_password(&req.email, ip).await?;
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// Complete a password reset with a single-use token.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 401, description = "Invalid or expired token")
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    state
        .auth
        .reset_password(&req.token, req.new_password, ip)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset. Please log in again.".to_string(),
    }))
}
