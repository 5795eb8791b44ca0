//! Audit event model - security and compliance logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit action codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    UserRegistered,
    UserLogin,
    UserLogout,
    PasswordResetRequested,
    PasswordResetCompleted,
    PasswordChanged,
    OtpVerified,
    HighRiskUserFlagged,
    PostingRestricted,
    FraudLogReviewed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "user_registered",
            AuditAction::UserLogin => "user_login",
            AuditAction::UserLogout => "user_logout",
            AuditAction::PasswordResetRequested => "password_reset_requested",
            AuditAction::PasswordResetCompleted => "password_reset_completed",
            AuditAction::PasswordChanged => "password_changed",
            AuditAction::OtpVerified => "otp_verified",
            AuditAction::HighRiskUserFlagged => "high_risk_user_flagged",
            AuditAction::PostingRestricted => "posting_restricted",
            AuditAction::FraudLogReviewed => "fraud_log_reviewed",
        }
    }
}

/// Audit event entity. Append-only.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action_code: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub detail: Option<serde_json::Value>,
    pub ip_text: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor_user_id: Option<Uuid>,
        action: AuditAction,
        entity_type: Option<&str>,
        entity_id: Option<Uuid>,
        detail: Option<serde_json::Value>,
        ip_text: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_user_id,
            action_code: action.as_str().to_string(),
            entity_type: entity_type.map(|s| s.to_string()),
            entity_id,
            detail,
            ip_text,
            created_utc: Utc::now(),
        }
    }
}
