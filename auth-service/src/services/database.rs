//! PostgreSQL store accessor.
//!
//! All conflicting writes rely on the store's row-level atomicity:
//! soft-revoke and consume operations are conditional updates whose
//! affected-row count tells the caller whether it won the race. Every call
//! is bounded by the configured query timeout; a timeout surfaces as the
//! transient `ServiceError::Timeout`, distinct from business rejections.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    AuditEvent, DeviceSession, FraudLog, HighRiskUser, OtpChannel, OtpRequest,
    PasswordResetToken, RefreshSession, Role, User,
};
use crate::services::ServiceError;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    query_timeout: Duration,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bound a store round-trip by the configured deadline.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(ServiceError::Database),
            Err(_) => Err(ServiceError::Timeout(op.to_string())),
        }
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.timed("health_check", async {
            sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
        })
        .await
    }

    // ==================== User Operations ====================

    /// Find user by ID.
    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        self.timed("find_user_by_id", async {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
        })
        .await
    }

    /// Find user by email (case-insensitive).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        self.timed("find_user_by_email", async {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
        })
        .await
    }

    /// Find user by phone number.
    pub async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError> {
        self.timed("find_user_by_phone", async {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone_text = $1")
                .bind(phone)
                .fetch_optional(&self.pool)
                .await
        })
        .await
    }

    /// Insert a new user. Unique violations on the named email/phone
    /// constraints are translated into typed conflicts; the constraints are
    /// also the enforcement point for concurrent phone auto-provisioning.
    pub async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.timed("insert_user", async {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, email, phone_text, password_hash_text, role_code, display_name, verified_flag, blocked_flag, deleted_flag, can_post_flag, last_login_utc, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(user.user_id)
            .bind(&user.email)
            .bind(&user.phone_text)
            .bind(&user.password_hash_text)
            .bind(&user.role_code)
            .bind(&user.display_name)
            .bind(user.verified_flag)
            .bind(user.blocked_flag)
            .bind(user.deleted_flag)
            .bind(user.can_post_flag)
            .bind(user.last_login_utc)
            .bind(user.created_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
        .map_err(map_user_conflict)
    }

    /// Update last-login timestamp.
    pub async fn update_last_login(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.timed("update_last_login", async {
            sqlx::query("UPDATE users SET last_login_utc = NOW() WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Replace a user's password hash.
    pub async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ServiceError> {
        self.timed("update_password_hash", async {
            sqlx::query("UPDATE users SET password_hash_text = $1 WHERE user_id = $2")
                .bind(password_hash)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Mark a user's channel identity as verified.
    pub async fn mark_user_verified(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.timed("mark_user_verified", async {
            sqlx::query("UPDATE users SET verified_flag = TRUE WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Set the posting-permission gate. Owned by the fraud engine.
    pub async fn set_can_post(&self, user_id: Uuid, can_post: bool) -> Result<(), ServiceError> {
        self.timed("set_can_post", async {
            sqlx::query("UPDATE users SET can_post_flag = $1 WHERE user_id = $2")
                .bind(can_post)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    // ==================== Role Operations ====================

    /// Find role by code.
    pub async fn find_role_by_code(&self, role_code: &str) -> Result<Option<Role>, ServiceError> {
        self.timed("find_role_by_code", async {
            sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_code = $1")
                .bind(role_code)
                .fetch_optional(&self.pool)
                .await
        })
        .await
    }

    // ==================== Refresh Session Operations ====================

    /// Insert a new refresh session.
    pub async fn insert_refresh_session(
        &self,
        session: &RefreshSession,
    ) -> Result<(), ServiceError> {
        self.timed("insert_refresh_session", async {
            sqlx::query(
                r#"
                INSERT INTO refresh_sessions (session_id, user_id, token_hash_text, expiry_utc, revoked_utc, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(session.session_id)
            .bind(session.user_id)
            .bind(&session.token_hash_text)
            .bind(session.expiry_utc)
            .bind(session.revoked_utc)
            .bind(session.created_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Find a live (unrevoked, unexpired) refresh session by token hash.
    pub async fn find_live_refresh_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, ServiceError> {
        self.timed("find_live_refresh_session", async {
            sqlx::query_as::<_, RefreshSession>(
                "SELECT * FROM refresh_sessions WHERE token_hash_text = $1 AND revoked_utc IS NULL AND expiry_utc > NOW()",
            )
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
        })
        .await
    }

    /// Conditionally revoke one refresh session. Returns the number of rows
    /// actually revoked: 0 means another caller already revoked it.
    pub async fn revoke_refresh_session(&self, session_id: Uuid) -> Result<u64, ServiceError> {
        self.timed("revoke_refresh_session", async {
            sqlx::query(
                "UPDATE refresh_sessions SET revoked_utc = NOW() WHERE session_id = $1 AND revoked_utc IS NULL",
            )
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
        })
        .await
    }

    /// Revoke every live refresh session for a user. Idempotent.
    pub async fn revoke_all_user_sessions(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        self.timed("revoke_all_user_sessions", async {
            sqlx::query(
                "UPDATE refresh_sessions SET revoked_utc = NOW() WHERE user_id = $1 AND revoked_utc IS NULL",
            )
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
        })
        .await
    }

    // ==================== Password Reset Token Operations ====================

    /// Insert a new password reset token.
    pub async fn insert_reset_token(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), ServiceError> {
        self.timed("insert_reset_token", async {
            sqlx::query(
                r#"
                INSERT INTO password_reset_tokens (reset_id, user_id, token_hash_text, expiry_utc, used_utc, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(token.reset_id)
            .bind(token.user_id)
            .bind(&token.token_hash_text)
            .bind(token.expiry_utc)
            .bind(token.used_utc)
            .bind(token.created_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Invalidate any active reset tokens for a user (at most one active
    /// token per user: minting a new one calls this first).
    pub async fn invalidate_active_reset_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<u64, ServiceError> {
        self.timed("invalidate_active_reset_tokens", async {
            sqlx::query(
                "UPDATE password_reset_tokens SET used_utc = NOW() WHERE user_id = $1 AND used_utc IS NULL AND expiry_utc > NOW()",
            )
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
        })
        .await
    }

    /// Find an active (unused, unexpired) reset token by hash.
    pub async fn find_active_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, ServiceError> {
        self.timed("find_active_reset_token", async {
            sqlx::query_as::<_, PasswordResetToken>(
                "SELECT * FROM password_reset_tokens WHERE token_hash_text = $1 AND used_utc IS NULL AND expiry_utc > NOW()",
            )
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
        })
        .await
    }

    /// Mark a reset token used. Single-use: the update is conditional and
    /// returns 0 rows if another caller consumed it first.
    pub async fn consume_reset_token(&self, reset_id: Uuid) -> Result<u64, ServiceError> {
        self.timed("consume_reset_token", async {
            sqlx::query(
                "UPDATE password_reset_tokens SET used_utc = NOW() WHERE reset_id = $1 AND used_utc IS NULL",
            )
            .bind(reset_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
        })
        .await
    }

    // ==================== OTP Request Operations ====================

    /// Insert an OTP request.
    pub async fn insert_otp_request(&self, otp: &OtpRequest) -> Result<(), ServiceError> {
        self.timed("insert_otp_request", async {
            sqlx::query(
                r#"
                INSERT INTO otp_requests (otp_id, user_id, channel_code, destination_text, code_hash_text, expiry_utc, verified_utc, attempt_count, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(otp.otp_id)
            .bind(otp.user_id)
            .bind(&otp.channel_code)
            .bind(&otp.destination_text)
            .bind(&otp.code_hash_text)
            .bind(otp.expiry_utc)
            .bind(otp.verified_utc)
            .bind(otp.attempt_count)
            .bind(otp.created_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Creation time of the most recent request for a destination,
    /// regardless of state. Drives the cooldown window.
    pub async fn latest_otp_created_utc(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        self.timed("latest_otp_created_utc", async {
            let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
                "SELECT created_utc FROM otp_requests WHERE channel_code = $1 AND destination_text = $2 ORDER BY created_utc DESC LIMIT 1",
            )
            .bind(channel.as_str())
            .bind(destination)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(|(t,)| t))
        })
        .await
    }

    /// The most recent unverified, unexpired request for a destination.
    /// Verification only ever considers this row.
    pub async fn find_latest_pending_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<Option<OtpRequest>, ServiceError> {
        self.timed("find_latest_pending_otp", async {
            sqlx::query_as::<_, OtpRequest>(
                r#"
                SELECT * FROM otp_requests
                WHERE channel_code = $1 AND destination_text = $2
                  AND verified_utc IS NULL AND expiry_utc > NOW()
                ORDER BY created_utc DESC LIMIT 1
                "#,
            )
            .bind(channel.as_str())
            .bind(destination)
            .fetch_optional(&self.pool)
            .await
        })
        .await
    }

    /// Increment the attempt counter of one request.
    pub async fn increment_otp_attempts(&self, otp_id: Uuid) -> Result<(), ServiceError> {
        self.timed("increment_otp_attempts", async {
            sqlx::query("UPDATE otp_requests SET attempt_count = attempt_count + 1 WHERE otp_id = $1")
                .bind(otp_id)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Mark a request verified. Single-use: conditional on it still being
    /// unverified; 0 rows means a concurrent verify won.
    pub async fn mark_otp_verified(&self, otp_id: Uuid) -> Result<u64, ServiceError> {
        self.timed("mark_otp_verified", async {
            sqlx::query(
                "UPDATE otp_requests SET verified_utc = NOW() WHERE otp_id = $1 AND verified_utc IS NULL",
            )
            .bind(otp_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
        })
        .await
    }

    /// Expire all outstanding unverified requests for a destination
    /// immediately (resend invalidates before reissuing).
    pub async fn expire_pending_otps(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<u64, ServiceError> {
        self.timed("expire_pending_otps", async {
            sqlx::query(
                "UPDATE otp_requests SET expiry_utc = NOW() WHERE channel_code = $1 AND destination_text = $2 AND verified_utc IS NULL AND expiry_utc > NOW()",
            )
            .bind(channel.as_str())
            .bind(destination)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
        })
        .await
    }

    // ==================== Device Session Operations ====================

    /// Insert a device session.
    pub async fn insert_device_session(
        &self,
        session: &DeviceSession,
    ) -> Result<(), ServiceError> {
        self.timed("insert_device_session", async {
            sqlx::query(
                r#"
                INSERT INTO device_sessions (device_session_id, user_id, created_utc, last_seen_utc)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(session.device_session_id)
            .bind(session.user_id)
            .bind(session.created_utc)
            .bind(session.last_seen_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Count device sessions created for a user since a point in time.
    pub async fn count_device_sessions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, ServiceError> {
        self.timed("count_device_sessions_since", async {
            let row: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM device_sessions WHERE user_id = $1 AND created_utc > $2",
            )
            .bind(user_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0)
        })
        .await
    }

    /// List a user's device sessions, newest first.
    pub async fn list_device_sessions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<DeviceSession>, ServiceError> {
        self.timed("list_device_sessions", async {
            sqlx::query_as::<_, DeviceSession>(
                "SELECT * FROM device_sessions WHERE user_id = $1 ORDER BY created_utc DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
        })
        .await
    }

    /// Refresh the last-seen timestamp of the user's most recent session.
    pub async fn touch_latest_device_session(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.timed("touch_latest_device_session", async {
            sqlx::query(
                r#"
                UPDATE device_sessions SET last_seen_utc = NOW()
                WHERE device_session_id = (
                    SELECT device_session_id FROM device_sessions
                    WHERE user_id = $1 ORDER BY created_utc DESC LIMIT 1
                )
                "#,
            )
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Users with at least `min_count` device sessions since a point in
    /// time. Feeds the periodic sweep.
    pub async fn users_with_device_sessions_since(
        &self,
        since: DateTime<Utc>,
        min_count: i64,
    ) -> Result<Vec<(Uuid, i64)>, ServiceError> {
        self.timed("users_with_device_sessions_since", async {
            sqlx::query_as::<_, (Uuid, i64)>(
                r#"
                SELECT user_id, COUNT(*) FROM device_sessions
                WHERE created_utc > $1
                GROUP BY user_id HAVING COUNT(*) >= $2
                "#,
            )
            .bind(since)
            .bind(min_count)
            .fetch_all(&self.pool)
            .await
        })
        .await
    }

    // ==================== Listing Queries (fraud rules) ====================
    // Listings are written by the CRUD layer; this service only reads them.

    /// Count a user's listings created since a point in time.
    pub async fn count_user_listings_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, ServiceError> {
        self.timed("count_user_listings_since", async {
            let row: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM listings WHERE user_id = $1 AND created_utc > $2",
            )
            .bind(user_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0)
        })
        .await
    }

    /// Whether a contact phone appears on another user's non-deleted listing.
    pub async fn phone_used_by_another_user(
        &self,
        contact_phone: &str,
        user_id: Uuid,
    ) -> Result<bool, ServiceError> {
        self.timed("phone_used_by_another_user", async {
            let row: (bool,) = sqlx::query_as(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM listings
                    WHERE contact_phone_text = $1 AND user_id != $2 AND deleted_flag = FALSE
                )
                "#,
            )
            .bind(contact_phone)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0)
        })
        .await
    }

    /// Count a user's rejected listings since a point in time.
    pub async fn count_user_rejections_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, ServiceError> {
        self.timed("count_user_rejections_since", async {
            let row: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM listings WHERE user_id = $1 AND status_code = 'rejected' AND created_utc > $2",
            )
            .bind(user_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0)
        })
        .await
    }

    /// Users with at least `min_count` rejected listings since a point in
    /// time. Feeds the periodic sweep.
    pub async fn users_with_rejections_since(
        &self,
        since: DateTime<Utc>,
        min_count: i64,
    ) -> Result<Vec<(Uuid, i64)>, ServiceError> {
        self.timed("users_with_rejections_since", async {
            sqlx::query_as::<_, (Uuid, i64)>(
                r#"
                SELECT user_id, COUNT(*) FROM listings
                WHERE status_code = 'rejected' AND created_utc > $1
                GROUP BY user_id HAVING COUNT(*) >= $2
                "#,
            )
            .bind(since)
            .bind(min_count)
            .fetch_all(&self.pool)
            .await
        })
        .await
    }

    // ==================== Fraud Log Operations ====================

    /// Insert a fraud log entry.
    pub async fn insert_fraud_log(&self, log: &FraudLog) -> Result<(), ServiceError> {
        self.timed("insert_fraud_log", async {
            sqlx::query(
                r#"
                INSERT INTO fraud_logs (fraud_log_id, user_id, rule_code, detail, risk_score, reviewed_flag, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(log.fraud_log_id)
            .bind(log.user_id)
            .bind(&log.rule_code)
            .bind(&log.detail)
            .bind(log.risk_score)
            .bind(log.reviewed_flag)
            .bind(log.created_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Whether an equivalent log entry already exists in the window.
    /// The sweep uses this to stay idempotent across re-runs.
    pub async fn recent_fraud_log_exists(
        &self,
        user_id: Uuid,
        rule_code: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        self.timed("recent_fraud_log_exists", async {
            let row: (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM fraud_logs WHERE user_id = $1 AND rule_code = $2 AND created_utc > $3)",
            )
            .bind(user_id)
            .bind(rule_code)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0)
        })
        .await
    }

    /// List fraud logs, optionally filtered by rule and minimum score.
    pub async fn list_fraud_logs(
        &self,
        rule_code: Option<&str>,
        min_score: Option<i32>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FraudLog>, ServiceError> {
        self.timed("list_fraud_logs", async {
            sqlx::query_as::<_, FraudLog>(
                r#"
                SELECT * FROM fraud_logs
                WHERE ($1::text IS NULL OR rule_code = $1)
                  AND ($2::int IS NULL OR risk_score >= $2)
                ORDER BY created_utc DESC LIMIT $3 OFFSET $4
                "#,
            )
            .bind(rule_code)
            .bind(min_score)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        })
        .await
    }

    /// List one user's fraud logs, newest first.
    pub async fn list_fraud_logs_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FraudLog>, ServiceError> {
        self.timed("list_fraud_logs_for_user", async {
            sqlx::query_as::<_, FraudLog>(
                "SELECT * FROM fraud_logs WHERE user_id = $1 ORDER BY created_utc DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
        })
        .await
    }

    /// Users whose summed risk score meets the threshold, highest first.
    /// Aggregate-score entries are excluded to avoid double counting.
    pub async fn list_high_risk_users(
        &self,
        threshold: i64,
    ) -> Result<Vec<HighRiskUser>, ServiceError> {
        self.timed("list_high_risk_users", async {
            sqlx::query_as::<_, HighRiskUser>(
                r#"
                SELECT user_id, SUM(risk_score) AS total_score, COUNT(*) AS log_count
                FROM fraud_logs
                WHERE rule_code != 'high_risk_user'
                GROUP BY user_id HAVING SUM(risk_score) >= $1
                ORDER BY total_score DESC
                "#,
            )
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
        })
        .await
    }

    /// Mark a fraud log entry reviewed. Returns 0 rows for unknown ids.
    pub async fn mark_fraud_log_reviewed(&self, fraud_log_id: Uuid) -> Result<u64, ServiceError> {
        self.timed("mark_fraud_log_reviewed", async {
            sqlx::query("UPDATE fraud_logs SET reviewed_flag = TRUE WHERE fraud_log_id = $1")
                .bind(fraud_log_id)
                .execute(&self.pool)
                .await
                .map(|r| r.rows_affected())
        })
        .await
    }

    // ==================== Audit Event Operations ====================

    /// Insert an audit event.
    pub async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), ServiceError> {
        self.timed("insert_audit_event", async {
            sqlx::query(
                r#"
                INSERT INTO audit_events (event_id, actor_user_id, action_code, entity_type, entity_id, detail, ip_text, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id)
            .bind(event.actor_user_id)
            .bind(&event.action_code)
            .bind(&event.entity_type)
            .bind(event.entity_id)
            .bind(&event.detail)
            .bind(&event.ip_text)
            .bind(event.created_utc)
            .execute(&self.pool)
            .await
            .map(|_| ())
        })
        .await
    }

    // ==================== Platform Settings ====================

    /// Read a platform setting.
    pub async fn get_platform_setting(
        &self,
        setting_key: &str,
    ) -> Result<Option<String>, ServiceError> {
        self.timed("get_platform_setting", async {
            let row: Option<(String,)> = sqlx::query_as(
                "SELECT setting_value FROM platform_settings WHERE setting_key = $1",
            )
            .bind(setting_key)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(|(v,)| v))
        })
        .await
    }
}

/// Translate a unique violation on the users table into a typed conflict.
fn map_user_conflict(err: ServiceError) -> ServiceError {
    if let ServiceError::Database(sqlx::Error::Database(db_err)) = &err {
        if db_err.code().as_deref() == Some("23505") {
            match db_err.constraint() {
                Some("users_email_key") => return ServiceError::EmailExists,
                Some("users_phone_key") => return ServiceError::PhoneExists,
                _ => {}
            }
        }
    }
    err
}
