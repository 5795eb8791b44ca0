//! Password reset token model.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Password reset token entity.
///
/// At most one token per user is active at a time: minting a new one marks
/// prior unused tokens as used. Marking used is terminal.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub reset_id: Uuid,
    pub user_id: Uuid,
    pub token_hash_text: String,
    pub expiry_utc: DateTime<Utc>,
    pub used_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Create a new reset token from a token hash.
    pub fn new(user_id: Uuid, token_hash: String, expiry_minutes: i64) -> Self {
        Self {
            reset_id: Uuid::new_v4(),
            user_id,
            token_hash_text: token_hash,
            expiry_utc: Utc::now() + Duration::minutes(expiry_minutes),
            used_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// A token is active iff it is unused and unexpired.
    pub fn is_active(&self) -> bool {
        self.used_utc.is_none() && self.expiry_utc > Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_active() {
        let token = PasswordResetToken::new(Uuid::new_v4(), "hash".to_string(), 30);
        assert!(token.is_active());
    }

    #[test]
    fn test_used_token_is_inactive() {
        let mut token = PasswordResetToken::new(Uuid::new_v4(), "hash".to_string(), 30);
        token.used_utc = Some(Utc::now());
        assert!(!token.is_active());
    }

    #[test]
    fn test_expired_token_is_inactive() {
        let mut token = PasswordResetToken::new(Uuid::new_v4(), "hash".to_string(), 30);
        token.expiry_utc = Utc::now() - Duration::seconds(1);
        assert!(!token.is_active());
    }
}
