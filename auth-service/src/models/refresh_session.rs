//! Refresh session model - persisted refresh-token state.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Refresh session entity.
///
/// Only the hash of the refresh token is ever stored; the raw value is
/// returned to the client once at issuance. Revocation is a soft flag so
/// the row stays around for audit.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub token_hash_text: String,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl RefreshSession {
    /// Create a new refresh session from a token hash.
    pub fn new(user_id: Uuid, token_hash: String, expiry_days: i64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            token_hash_text: token_hash,
            expiry_utc: Utc::now() + Duration::days(expiry_days),
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// A session is valid iff it is neither revoked nor expired.
    pub fn is_valid(&self) -> bool {
        self.revoked_utc.is_none() && self.expiry_utc > Utc::now()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_valid() {
        let session = RefreshSession::new(Uuid::new_v4(), "hash".to_string(), 7);
        assert!(session.is_valid());
        assert!(!session.is_expired());
        assert!(!session.is_revoked());
    }

    #[test]
    fn test_expired_session_is_invalid() {
        let mut session = RefreshSession::new(Uuid::new_v4(), "hash".to_string(), 7);
        session.expiry_utc = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        assert!(!session.is_valid());
    }

    #[test]
    fn test_revoked_session_is_invalid() {
        let mut session = RefreshSession::new(Uuid::new_v4(), "hash".to_string(), 7);
        session.revoked_utc = Some(Utc::now());
        assert!(session.is_revoked());
        assert!(!session.is_valid());
    }
}
