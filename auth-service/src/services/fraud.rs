//! Fraud risk engine.
//!
//! Stateless rule evaluation over store-provided counts. Each rule that
//! fires writes an append-only fraud log entry with a fixed weight; on
//! listing creation the fired weights are summed and compared against the
//! risk threshold to decide flagging. Rejection escalation revokes posting
//! permission directly, independent of the aggregate path.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::FraudConfig;
use crate::models::{AuditAction, AuditEvent, FraudLog, FraudRule, HighRiskUser};
use crate::services::{metrics, Database, ServiceError};

/// A fired rule: fixed weight plus the evidence that triggered it.
#[derive(Debug, Clone)]
pub struct RuleHit {
    pub rule: FraudRule,
    pub score: i32,
    pub detail: serde_json::Value,
}

/// Rule: more listings in the trailing hour than the threshold allows.
/// `recent_count` includes the listing that triggered the evaluation.
pub fn check_too_many_listings(recent_count: i64, max_per_hour: i64) -> Option<RuleHit> {
    if recent_count > max_per_hour {
        Some(RuleHit {
            rule: FraudRule::TooManyListings,
            score: FraudRule::TooManyListings.weight(),
            detail: json!({ "listings_last_hour": recent_count, "max_per_hour": max_per_hour }),
        })
    } else {
        None
    }
}

/// Rule: the listing's contact phone appears on another user's live listing.
pub fn check_repeated_phone(phone_shared: bool, contact_phone: &str) -> Option<RuleHit> {
    if phone_shared {
        Some(RuleHit {
            rule: FraudRule::RepeatedPhone,
            score: FraudRule::RepeatedPhone.weight(),
            detail: json!({ "contact_phone": contact_phone }),
        })
    } else {
        None
    }
}

/// Rule: rejected-listing count in the window reached the threshold.
pub fn check_repeated_rejection(rejection_count: i64, max_rejections: i64) -> Option<RuleHit> {
    if rejection_count >= max_rejections {
        Some(RuleHit {
            rule: FraudRule::RepeatedRejection,
            score: FraudRule::RepeatedRejection.weight(),
            detail: json!({ "rejections": rejection_count, "max_rejections": max_rejections }),
        })
    } else {
        None
    }
}

/// Rule: more device sessions in the trailing day than the threshold allows.
pub fn check_many_devices(device_count: i64, max_per_day: i64) -> Option<RuleHit> {
    if device_count > max_per_day {
        Some(RuleHit {
            rule: FraudRule::ManyDevices,
            score: FraudRule::ManyDevices.weight(),
            detail: json!({ "devices_last_day": device_count, "max_per_day": max_per_day }),
        })
    } else {
        None
    }
}

/// Sum of fired weights.
pub fn aggregate_score(hits: &[RuleHit]) -> i32 {
    hits.iter().map(|h| h.score).sum()
}

/// Escalation decision for the rejection rule: reaching twice the rejection
/// threshold revokes posting permission outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionEscalation {
    Keep,
    RestrictPosting,
}

pub fn rejection_escalation(rejection_count: i64, max_rejections: i64) -> RejectionEscalation {
    if rejection_count >= max_rejections * 2 {
        RejectionEscalation::RestrictPosting
    } else {
        RejectionEscalation::Keep
    }
}

/// Summary of one periodic sweep run.
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub device_entries: u64,
    pub rejection_entries: u64,
}

#[derive(Clone)]
pub struct FraudService {
    db: Database,
    config: FraudConfig,
}

impl FraudService {
    pub fn new(db: Database, config: FraudConfig) -> Self {
        Self { db, config }
    }

    async fn record_hit(&self, user_id: Uuid, hit: &RuleHit) -> Result<(), ServiceError> {
        let log = FraudLog::new(user_id, hit.rule, hit.detail.clone(), hit.score);
        self.db.insert_fraud_log(&log).await?;
        metrics::inc_labeled(&metrics::FRAUD_LOGS_TOTAL, hit.rule.as_str());
        tracing::warn!(
            user_id = %user_id,
            rule = hit.rule.as_str(),
            score = hit.score,
            "Fraud rule fired"
        );
        Ok(())
    }

    /// Evaluate listing-creation rules and aggregate. Returns the total
    /// score of fired rules (0 when nothing fired).
    #[tracing::instrument(skip(self))]
    pub async fn on_listing_created(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
        contact_phone: Option<&str>,
    ) -> Result<i32, ServiceError> {
        let hour_ago = Utc::now() - Duration::hours(1);
        let recent = self.db.count_user_listings_since(user_id, hour_ago).await?;

        let mut hits = Vec::new();
        if let Some(hit) = check_too_many_listings(recent, self.config.max_listings_per_hour) {
            hits.push(hit);
        }
        if let Some(phone) = contact_phone {
            let shared = self.db.phone_used_by_another_user(phone, user_id).await?;
            if let Some(hit) = check_repeated_phone(shared, phone) {
                hits.push(hit);
            }
        }

        for hit in &hits {
            self.record_hit(user_id, hit).await?;
        }

        let total = aggregate_score(&hits);
        if total >= self.config.risk_score_threshold {
            self.flag_high_risk_user(user_id, total).await?;
        }

        Ok(total)
    }

    /// Evaluate the rejection rule; at twice the threshold the user loses
    /// posting permission as a direct side effect.
    #[tracing::instrument(skip(self))]
    pub async fn on_listing_rejected(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
    ) -> Result<(), ServiceError> {
        let week_ago = Utc::now() - Duration::days(7);
        let rejections = self
            .db
            .count_user_rejections_since(user_id, week_ago)
            .await?;

        if let Some(hit) = check_repeated_rejection(rejections, self.config.max_rejections) {
            self.record_hit(user_id, &hit).await?;
        }

        if rejection_escalation(rejections, self.config.max_rejections)
            == RejectionEscalation::RestrictPosting
        {
            self.db.set_can_post(user_id, false).await?;
            self.audit(AuditEvent::new(
                None,
                AuditAction::PostingRestricted,
                Some("user"),
                Some(user_id),
                Some(json!({ "rejections_last_7d": rejections })),
                None,
            ))
            .await;
            tracing::warn!(user_id = %user_id, rejections, "Posting permission revoked");
        }

        Ok(())
    }

    /// Async login trigger: count device sessions in the trailing day.
    #[tracing::instrument(skip(self))]
    pub async fn on_login_device_check(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let day_ago = Utc::now() - Duration::hours(24);
        let devices = self
            .db
            .count_device_sessions_since(user_id, day_ago)
            .await?;

        if let Some(hit) = check_many_devices(devices, self.config.max_devices_per_day) {
            self.record_hit(user_id, &hit).await?;
        }
        Ok(())
    }

    /// Flag a user as high risk at the given aggregate score. Writes the
    /// log entry and an audit record; it does not block the user.
    pub async fn flag_high_risk_user(
        &self,
        user_id: Uuid,
        total_score: i32,
    ) -> Result<(), ServiceError> {
        let log = FraudLog::new(
            user_id,
            FraudRule::HighRiskUser,
            json!({ "aggregate_score": total_score }),
            total_score,
        );
        self.db.insert_fraud_log(&log).await?;
        metrics::inc(&metrics::HIGH_RISK_FLAGS_TOTAL);

        self.audit(AuditEvent::new(
            None,
            AuditAction::HighRiskUserFlagged,
            Some("user"),
            Some(user_id),
            Some(json!({ "aggregate_score": total_score })),
            None,
        ))
        .await;

        tracing::warn!(user_id = %user_id, total_score, "User flagged as high risk");
        Ok(())
    }

    /// Periodic sweep: re-derive device and rejection anomalies over longer
    /// windows. De-duplicates against entries already logged in the
    /// trailing day for the same rule and user, so re-runs are idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepSummary, ServiceError> {
        let mut summary = SweepSummary::default();
        let dedup_window = Utc::now() - Duration::hours(24);

        let day_ago = Utc::now() - Duration::hours(24);
        let device_offenders = self
            .db
            .users_with_device_sessions_since(day_ago, self.config.max_devices_per_day + 1)
            .await?;
        for (user_id, count) in device_offenders {
            if self
                .db
                .recent_fraud_log_exists(user_id, FraudRule::ManyDevices.as_str(), dedup_window)
                .await?
            {
                continue;
            }
            if let Some(hit) = check_many_devices(count, self.config.max_devices_per_day) {
                self.record_hit(user_id, &hit).await?;
                summary.device_entries += 1;
            }
        }

        let month_ago = Utc::now() - Duration::days(30);
        let rejection_offenders = self
            .db
            .users_with_rejections_since(month_ago, self.config.max_rejections)
            .await?;
        for (user_id, count) in rejection_offenders {
            if self
                .db
                .recent_fraud_log_exists(
                    user_id,
                    FraudRule::RepeatedRejection.as_str(),
                    dedup_window,
                )
                .await?
            {
                continue;
            }
            if let Some(hit) = check_repeated_rejection(count, self.config.max_rejections) {
                self.record_hit(user_id, &hit).await?;
                summary.rejection_entries += 1;
            }
        }

        tracing::info!(
            device_entries = summary.device_entries,
            rejection_entries = summary.rejection_entries,
            "Fraud sweep completed"
        );
        Ok(summary)
    }

    // ==================== Operator queries ====================

    pub async fn list_logs(
        &self,
        rule_code: Option<&str>,
        min_score: Option<i32>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FraudLog>, ServiceError> {
        self.db
            .list_fraud_logs(rule_code, min_score, limit, offset)
            .await
    }

    pub async fn user_logs(&self, user_id: Uuid) -> Result<Vec<FraudLog>, ServiceError> {
        self.db.list_fraud_logs_for_user(user_id).await
    }

    pub async fn high_risk_users(&self) -> Result<Vec<HighRiskUser>, ServiceError> {
        self.db
            .list_high_risk_users(self.config.risk_score_threshold as i64)
            .await
    }

    /// Mark a log entry reviewed, audit-logged with the reviewing operator.
    pub async fn review_log(
        &self,
        fraud_log_id: Uuid,
        reviewer_user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let updated = self.db.mark_fraud_log_reviewed(fraud_log_id).await?;
        if updated == 0 {
            return Err(ServiceError::FraudLogNotFound);
        }

        self.audit(AuditEvent::new(
            Some(reviewer_user_id),
            AuditAction::FraudLogReviewed,
            Some("fraud_log"),
            Some(fraud_log_id),
            None,
            None,
        ))
        .await;

        Ok(())
    }

    /// Audit writes are always attempted; their failure never fails the flow.
    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.db.insert_audit_event(&event).await {
            tracing::error!(error = %e, action = %event.action_code, "Failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_LISTINGS: i64 = 10;
    const MAX_REJECTIONS: i64 = 3;
    const MAX_DEVICES: i64 = 5;

    #[test]
    fn test_too_many_listings_boundary() {
        // The 10th listing in the hour is allowed; the 11th fires at 40.
        assert!(check_too_many_listings(MAX_LISTINGS, MAX_LISTINGS).is_none());
        let hit = check_too_many_listings(MAX_LISTINGS + 1, MAX_LISTINGS).unwrap();
        assert_eq!(hit.rule, FraudRule::TooManyListings);
        assert_eq!(hit.score, 40);
    }

    #[test]
    fn test_repeated_phone_fires_only_when_shared() {
        assert!(check_repeated_phone(false, "+15550001111").is_none());
        let hit = check_repeated_phone(true, "+15550001111").unwrap();
        assert_eq!(hit.score, 50);
    }

    #[test]
    fn test_repeated_rejection_threshold_inclusive() {
        assert!(check_repeated_rejection(MAX_REJECTIONS - 1, MAX_REJECTIONS).is_none());
        let hit = check_repeated_rejection(MAX_REJECTIONS, MAX_REJECTIONS).unwrap();
        assert_eq!(hit.score, 35);
    }

    #[test]
    fn test_many_devices_boundary() {
        assert!(check_many_devices(MAX_DEVICES, MAX_DEVICES).is_none());
        let hit = check_many_devices(MAX_DEVICES + 1, MAX_DEVICES).unwrap();
        assert_eq!(hit.score, 30);
    }

    #[test]
    fn test_single_rule_does_not_reach_typical_threshold() {
        // With only too-many-listings fired, a 70-point threshold is not
        // met: the user is logged but not auto-flagged.
        let hits = vec![check_too_many_listings(11, 10).unwrap()];
        let total = aggregate_score(&hits);
        assert_eq!(total, 40);
        assert!(total < 70);
    }

    #[test]
    fn test_combined_rules_reach_threshold() {
        let hits = vec![
            check_too_many_listings(11, 10).unwrap(),
            check_repeated_phone(true, "+15550001111").unwrap(),
        ];
        assert_eq!(aggregate_score(&hits), 90);
        assert!(aggregate_score(&hits) >= 70);
    }

    #[test]
    fn test_rejection_escalation_at_double_threshold() {
        assert_eq!(
            rejection_escalation(MAX_REJECTIONS, MAX_REJECTIONS),
            RejectionEscalation::Keep
        );
        assert_eq!(
            rejection_escalation(MAX_REJECTIONS * 2 - 1, MAX_REJECTIONS),
            RejectionEscalation::Keep
        );
        // The 6th rejection (2 x 3) revokes posting permission.
        assert_eq!(
            rejection_escalation(MAX_REJECTIONS * 2, MAX_REJECTIONS),
            RejectionEscalation::RestrictPosting
        );
    }

    #[test]
    fn test_aggregate_score_empty() {
        assert_eq!(aggregate_score(&[]), 0);
    }
}
