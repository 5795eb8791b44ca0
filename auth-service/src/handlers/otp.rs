//! OTP handlers: phone registration/login and email password-reset codes.

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::ToSchema;
use validator::Validate;

use super::auth::client_ip;
use crate::models::OtpChannel;
use crate::services::OtpVerifyResponse;
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendOtpRequest {
    pub channel: OtpChannel,
    /// Phone number (E.164) or email address, depending on channel.
    #[validate(length(min = 3, max = 254))]
    pub destination: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    pub channel: OtpChannel,
    #[validate(length(min = 3, max = 254))]
    pub destination: String,
    #[validate(length(min = 4, max = 10))]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendOtpResponse {
    pub message: String,
    pub expires_in: i64,
}

/// Send a one-time code.
#[utoipa::path(
    post,
    path = "/auth/otp/send",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = SendOtpResponse),
        (status = 429, description = "Cooldown in effect; Retry-After carries the wait")
    ),
    tag = "OTP"
)]
pub async fn send_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, AppError> {
    let sent = state.auth.send_otp(req.channel, &req.destination).await?;
    Ok(Json(SendOtpResponse {
        message: "Verification code sent".to_string(),
        expires_in: sent.expires_in,
    }))
}

/// Invalidate any outstanding code and send a fresh one, bypassing the
/// cooldown once.
#[utoipa::path(
    post,
    path = "/auth/otp/resend",
    request_body = SendOtpRequest,
    responses((status = 200, description = "Code re-sent", body = SendOtpResponse)),
    tag = "OTP"
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, AppError> {
    let sent = state.auth.resend_otp(req.channel, &req.destination).await?;
    Ok(Json(SendOtpResponse {
        message: "Verification code re-sent".to_string(),
        expires_in: sent.expires_in,
    }))
}

/// Verify a one-time code. Phone codes log the caller in (provisioning an
/// account on first use); email codes yield a password-reset token.
#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code verified", body = OtpVerifyResponse),
        (status = 401, description = "Invalid or expired code")
    ),
    tag = "OTP"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<Json<OtpVerifyResponse>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    let response = state
        .auth
        .verify_otp(req.channel, &req.destination, &req.code, ip)
        .await?;
    Ok(Json(response))
}
