//! Maintenance-mode read-through cache.
//!
//! Process-wide TTL cache over the `platform_settings` row. On a read
//! failure the last known value is served, falling back to "not in
//! maintenance" when nothing has been read yet.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::services::Database;

const SETTING_KEY: &str = "maintenance_mode";
const FALLBACK: bool = false;

#[derive(Debug)]
struct CacheSlot {
    value: bool,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct MaintenanceCache {
    db: Database,
    ttl: Duration,
    slot: Arc<RwLock<Option<CacheSlot>>>,
}

impl MaintenanceCache {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            ttl,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Whether the platform is in maintenance mode.
    pub async fn maintenance_enabled(&self) -> bool {
        {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return cached.value;
                }
            }
        }

        match self.db.get_platform_setting(SETTING_KEY).await {
            Ok(value) => {
                let enabled = value.as_deref() == Some("true");
                let mut slot = self.slot.write().await;
                *slot = Some(CacheSlot {
                    value: enabled,
                    fetched_at: Instant::now(),
                });
                enabled
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh maintenance flag; serving last known value");
                let slot = self.slot.read().await;
                slot.as_ref().map(|c| c.value).unwrap_or(FALLBACK)
            }
        }
    }
}
