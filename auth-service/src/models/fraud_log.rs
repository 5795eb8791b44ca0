//! Fraud log model - append-only rule hits and risk scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fraud rule identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudRule {
    TooManyListings,
    RepeatedPhone,
    RepeatedRejection,
    ManyDevices,
    HighRiskUser,
}

impl FraudRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudRule::TooManyListings => "too_many_listings",
            FraudRule::RepeatedPhone => "repeated_phone",
            FraudRule::RepeatedRejection => "repeated_rejection",
            FraudRule::ManyDevices => "many_devices",
            FraudRule::HighRiskUser => "high_risk_user",
        }
    }

    /// Fixed risk weight of the rule. `HighRiskUser` entries carry the
    /// aggregated score of the rules that triggered them instead.
    pub fn weight(&self) -> i32 {
        match self {
            FraudRule::TooManyListings => 40,
            FraudRule::RepeatedPhone => 50,
            FraudRule::RepeatedRejection => 35,
            FraudRule::ManyDevices => 30,
            FraudRule::HighRiskUser => 0,
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "too_many_listings" => Some(FraudRule::TooManyListings),
            "repeated_phone" => Some(FraudRule::RepeatedPhone),
            "repeated_rejection" => Some(FraudRule::RepeatedRejection),
            "many_devices" => Some(FraudRule::ManyDevices),
            "high_risk_user" => Some(FraudRule::HighRiskUser),
            _ => None,
        }
    }
}

/// Fraud log entity. Append-only; only `reviewed_flag` is ever mutated.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct FraudLog {
    pub fraud_log_id: Uuid,
    pub user_id: Uuid,
    pub rule_code: String,
    pub detail: serde_json::Value,
    pub risk_score: i32,
    pub reviewed_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl FraudLog {
    pub fn new(user_id: Uuid, rule: FraudRule, detail: serde_json::Value, risk_score: i32) -> Self {
        Self {
            fraud_log_id: Uuid::new_v4(),
            user_id,
            rule_code: rule.as_str().to_string(),
            detail,
            risk_score,
            reviewed_flag: false,
            created_utc: Utc::now(),
        }
    }
}

/// Aggregated row for the high-risk operator view.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct HighRiskUser {
    pub user_id: Uuid,
    pub total_score: i64,
    pub log_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_weights_match_policy() {
        assert_eq!(FraudRule::TooManyListings.weight(), 40);
        assert_eq!(FraudRule::RepeatedPhone.weight(), 50);
        assert_eq!(FraudRule::RepeatedRejection.weight(), 35);
        assert_eq!(FraudRule::ManyDevices.weight(), 30);
    }

    #[test]
    fn test_rule_code_round_trip() {
        for rule in [
            FraudRule::TooManyListings,
            FraudRule::RepeatedPhone,
            FraudRule::RepeatedRejection,
            FraudRule::ManyDevices,
            FraudRule::HighRiskUser,
        ] {
            assert_eq!(FraudRule::parse(rule.as_str()), Some(rule));
        }
        assert_eq!(FraudRule::parse("unknown_rule"), None);
    }
}
