//! Authenticated profile handlers.

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use std::net::SocketAddr;
use utoipa::ToSchema;
use validator::Validate;

use super::auth::{client_ip, MessageResponse};
use crate::middleware::AuthUser;
use crate::models::{DeviceSession, UserResponse};
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Current user's profile.
#[utoipa::path(
    get,
    path = "/users/me",
    responses((status = 200, description = "Profile", body = UserResponse)),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth.get_me(claims.user_id()?).await?;
    Ok(Json(user))
}

/// Change password; every refresh token is revoked on success.
#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password incorrect")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    state
        .auth
        .change_password(claims.user_id()?, req.current_password, req.new_password, ip)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed. Please log in again.".to_string(),
    }))
}

/// The user's device sessions (active logins).
#[utoipa::path(
    get,
    path = "/users/me/sessions",
    responses((status = 200, description = "Device sessions", body = [DeviceSession])),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<DeviceSession>>, AppError> {
    let sessions = state.auth.list_sessions(claims.user_id()?).await?;
    Ok(Json(sessions))
}

/// Log out everywhere: revoke every refresh token for the account.
#[utoipa::path(
    post,
    path = "/auth/logout-all",
    responses((status = 200, description = "All sessions revoked", body = MessageResponse)),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
pub async fn logout_all(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<MessageResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    state.auth.logout_all(claims.user_id()?, ip).await?;
    Ok(Json(MessageResponse {
        message: "Logged out everywhere".to_string(),
    }))
}
