//! Operator endpoints for the fraud risk engine. Admin role required.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::MessageResponse;
use crate::middleware::{require_admin, AuthUser};
use crate::models::{FraudLog, HighRiskUser};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct FraudLogFilter {
    /// Rule code filter, e.g. `too_many_listings`.
    pub rule: Option<String>,
    /// Minimum risk score.
    pub min_score: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List fraud logs, filterable by rule type and minimum score.
#[utoipa::path(
    get,
    path = "/fraud/logs",
    params(FraudLogFilter),
    responses((status = 200, description = "Fraud logs", body = [FraudLog])),
    security(("bearer_auth" = [])),
    tag = "Fraud"
)]
pub async fn list_fraud_logs(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(filter): Query<FraudLogFilter>,
) -> Result<Json<Vec<FraudLog>>, AppError> {
    require_admin(&claims)?;
    let logs = state
        .fraud
        .list_logs(
            filter.rule.as_deref(),
            filter.min_score,
            filter.limit.unwrap_or(50).clamp(1, 200),
            filter.offset.unwrap_or(0).max(0),
        )
        .await?;
    Ok(Json(logs))
}

/// One user's fraud logs.
#[utoipa::path(
    get,
    path = "/fraud/users/{user_id}/logs",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Fraud logs", body = [FraudLog])),
    security(("bearer_auth" = [])),
    tag = "Fraud"
)]
pub async fn get_user_fraud_logs(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FraudLog>>, AppError> {
    require_admin(&claims)?;
    let logs = state.fraud.user_logs(user_id).await?;
    Ok(Json(logs))
}

/// Users whose summed risk score meets the configured threshold.
#[utoipa::path(
    get,
    path = "/fraud/high-risk-users",
    responses((status = 200, description = "High-risk users", body = [HighRiskUser])),
    security(("bearer_auth" = [])),
    tag = "Fraud"
)]
pub async fn list_high_risk_users(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<HighRiskUser>>, AppError> {
    require_admin(&claims)?;
    let users = state.fraud.high_risk_users().await?;
    Ok(Json(users))
}

/// Mark a fraud log entry reviewed.
#[utoipa::path(
    post,
    path = "/fraud/logs/{fraud_log_id}/review",
    params(("fraud_log_id" = Uuid, Path, description = "Fraud log id")),
    responses(
        (status = 200, description = "Marked reviewed", body = MessageResponse),
        (status = 404, description = "Unknown log entry")
    ),
    security(("bearer_auth" = [])),
    tag = "Fraud"
)]
pub async fn review_fraud_log(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(fraud_log_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    require_admin(&claims)?;
    state
        .fraud
        .review_log(fraud_log_id, claims.user_id()?)
        .await?;
    Ok(Json(MessageResponse {
        message: "Fraud log marked reviewed".to_string(),
    }))
}
