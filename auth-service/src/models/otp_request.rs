//! OTP request model - one-time codes for phone and email flows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Delivery channel for a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Phone,
    Email,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Phone => "phone",
            OtpChannel::Email => "email",
        }
    }
}

/// Result of checking a submitted code against a stored request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    /// Code matches and the request is still live.
    Match,
    /// Request is live but the code is wrong; the attempt counter should be
    /// incremented.
    Mismatch,
    /// Attempt budget spent; the request is dead even for the correct code.
    Exhausted,
    Expired,
    AlreadyVerified,
}

/// OTP request entity.
///
/// `user_id` is null for phone registrations that have not provisioned an
/// account yet. Matching is always scoped to (channel_code,
/// destination_text), so codes for one destination can never satisfy another.
#[derive(Debug, Clone, FromRow)]
pub struct OtpRequest {
    pub otp_id: Uuid,
    pub user_id: Option<Uuid>,
    pub channel_code: String,
    pub destination_text: String,
    pub code_hash_text: String,
    pub expiry_utc: DateTime<Utc>,
    pub verified_utc: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub created_utc: DateTime<Utc>,
}

impl OtpRequest {
    /// Create a new OTP request from a code hash.
    pub fn new(
        user_id: Option<Uuid>,
        channel: OtpChannel,
        destination: String,
        code_hash: String,
        expiry_seconds: i64,
    ) -> Self {
        Self {
            otp_id: Uuid::new_v4(),
            user_id,
            channel_code: channel.as_str().to_string(),
            destination_text: destination,
            code_hash_text: code_hash,
            expiry_utc: Utc::now() + Duration::seconds(expiry_seconds),
            verified_utc: None,
            attempt_count: 0,
            created_utc: Utc::now(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_utc.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    /// Check a submitted code hash against this request.
    ///
    /// Exhaustion is checked before the hash comparison: once the attempt
    /// budget is spent the request never matches again, correct code or not.
    pub fn check(&self, submitted_hash: &str, max_attempts: i32) -> OtpCheck {
        if self.is_verified() {
            return OtpCheck::AlreadyVerified;
        }
        if self.is_expired() {
            return OtpCheck::Expired;
        }
        if self.attempt_count >= max_attempts {
            return OtpCheck::Exhausted;
        }
        if self.code_hash_text == submitted_hash {
            OtpCheck::Match
        } else {
            OtpCheck::Mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_ATTEMPTS: i32 = 5;

    fn request_with_hash(hash: &str) -> OtpRequest {
        OtpRequest::new(
            None,
            OtpChannel::Phone,
            "+15550001111".to_string(),
            hash.to_string(),
            300,
        )
    }

    #[test]
    fn test_correct_code_matches() {
        let req = request_with_hash("good");
        assert_eq!(req.check("good", MAX_ATTEMPTS), OtpCheck::Match);
    }

    #[test]
    fn test_wrong_code_mismatches_until_budget_spent() {
        let mut req = request_with_hash("good");

        // The MAX_ATTEMPTS-th wrong guess still reports a plain mismatch:
        // attempt_count is the number of *prior* failures.
        for prior_failures in 0..MAX_ATTEMPTS {
            req.attempt_count = prior_failures;
            assert_eq!(req.check("bad", MAX_ATTEMPTS), OtpCheck::Mismatch);
        }

        // Once the budget is spent, even the correct code is refused.
        req.attempt_count = MAX_ATTEMPTS;
        assert_eq!(req.check("good", MAX_ATTEMPTS), OtpCheck::Exhausted);
        assert_eq!(req.check("bad", MAX_ATTEMPTS), OtpCheck::Exhausted);
    }

    #[test]
    fn test_verified_request_never_matches_again() {
        let mut req = request_with_hash("good");
        req.verified_utc = Some(Utc::now());
        assert_eq!(req.check("good", MAX_ATTEMPTS), OtpCheck::AlreadyVerified);
    }

    #[test]
    fn test_expired_request_never_matches() {
        let mut req = request_with_hash("good");
        req.expiry_utc = Utc::now() - Duration::seconds(1);
        assert_eq!(req.check("good", MAX_ATTEMPTS), OtpCheck::Expired);
    }
}
