//! Device session model - one row per login.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Device session entity.
///
/// Used as a rolling-window count for the many-devices fraud rule and as the
/// user's list of active logins. Concurrent logins intentionally create
/// multiple rows (multi-device use).
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct DeviceSession {
    pub device_session_id: Uuid,
    pub user_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub last_seen_utc: DateTime<Utc>,
}

impl DeviceSession {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            device_session_id: Uuid::new_v4(),
            user_id,
            created_utc: now,
            last_seen_utc: now,
        }
    }
}
