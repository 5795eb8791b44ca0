//! Auth orchestrator: the only component route handlers call directly.
//!
//! Composes the store accessor, token manager, OTP subsystem and fraud
//! engine into the register/login/logout/reset/change-password flows.
//! Fire-and-forget side effects go through the background queue; audit
//! writes are always attempted and their failures swallowed after logging.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    AuditAction, AuditEvent, DeviceSession, LoginRequest, OtpChannel, RegisterRequest, User,
    UserResponse,
};
use crate::services::{
    metrics, BackgroundTasks, Database, EmailProvider, FraudService, NewNotification,
    NotificationSink, OtpOutcome, OtpSent, OtpService, ServiceError, TokenManager, TokenPair,
};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Returned for both known and unknown emails so the endpoint cannot be
/// used to enumerate accounts.
pub const NEUTRAL_RESET_MESSAGE: &str =
    "If an account exists for that email, a reset code has been sent.";

/// Auth response with user info and tokens.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Result of a successful OTP verification, shaped per flow.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum OtpVerifyResponse {
    Session {
        user: UserResponse,
        tokens: TokenPair,
    },
    Reset {
        message: String,
        reset_token: String,
    },
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: TokenManager,
    otp: OtpService,
    fraud: FraudService,
    email: Arc<dyn EmailProvider>,
    notify: Arc<dyn NotificationSink>,
    tasks: BackgroundTasks,
    hash_time_cost: u32,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        tokens: TokenManager,
        otp: OtpService,
        fraud: FraudService,
        email: Arc<dyn EmailProvider>,
        notify: Arc<dyn NotificationSink>,
        tasks: BackgroundTasks,
        hash_time_cost: u32,
    ) -> Self {
        Self {
            db,
            tokens,
            otp,
            fraud,
            email,
            notify,
            tasks,
            hash_time_cost,
        }
    }

    /// Register a new account and log it in.
    #[tracing::instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(
        &self,
        req: RegisterRequest,
        ip_address: Option<String>,
    ) -> Result<AuthResponse, ServiceError> {
        let role = self
            .db
            .find_role_by_code(req.role.code())
            .await?
            .ok_or_else(|| ServiceError::InvalidRole(req.role.code().to_string()))?;

        // Fast-path existence checks; the store's unique constraints remain
        // the authoritative arbiter under concurrency.
        if self.db.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::EmailExists);
        }
        if let Some(phone) = &req.phone {
            if self.db.find_user_by_phone(phone).await?.is_some() {
                return Err(ServiceError::PhoneExists);
            }
        }

        let password_hash = hash_password(&Password::new(req.password), self.hash_time_cost)?;

        let user = User::new(
            req.email.clone(),
            req.phone,
            password_hash.into_string(),
            role.role_code,
            Some(req.display_name),
        );
        self.db.insert_user(&user).await?;

        tracing::info!(user_id = %user.user_id, "User registered");

        self.audit(AuditEvent::new(
            Some(user.user_id),
            AuditAction::UserRegistered,
            Some("user"),
            Some(user.user_id),
            None,
            ip_address,
        ))
        .await;

        // Welcome notification is best-effort and must never fail the flow.
        let notify = self.notify.clone();
        let email = self.email.clone();
        let user_id = user.user_id;
        let to = user.email.clone();
        let name = user.display_name.clone();
        self.tasks.submit("welcome_notification", async move {
            notify
                .create_notification(NewNotification {
                    user_id,
                    notification_type: "welcome".to_string(),
                    title: "Welcome!".to_string(),
                    message: "Your marketplace account is ready.".to_string(),
                    data: json!({}),
                })
                .await?;
            email.send_welcome_email(&to, name.as_deref()).await?;
            Ok(())
        });

        let tokens = self.tokens.issue_pair(&user).await?;
        Ok(AuthResponse {
            user: user.sanitized(),
            tokens,
        })
    }

    /// Email/password login.
    #[tracing::instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(
        &self,
        req: LoginRequest,
        ip_address: Option<String>,
    ) -> Result<AuthResponse, ServiceError> {
        let user = match self.db.find_user_by_email(&req.email).await? {
            Some(user) => user,
            None => {
                metrics::inc(&metrics::LOGIN_FAILURE_TOTAL);
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if verify_password(
            &Password::new(req.password),
            &PasswordHashString::new(user.password_hash_text.clone()),
        )
        .is_err()
        {
            metrics::inc(&metrics::LOGIN_FAILURE_TOTAL);
            return Err(ServiceError::InvalidCredentials);
        }

        // Identity is confirmed at this point, so the account-state errors
        // are allowed to be specific.
        if user.blocked_flag {
            return Err(ServiceError::UserBlocked);
        }
        if user.deleted_flag {
            return Err(ServiceError::UserDeleted);
        }

        self.complete_login(&user, ip_address).await?;

        metrics::inc(&metrics::LOGIN_SUCCESS_TOTAL);
        tracing::info!(user_id = %user.user_id, "User logged in");

        let tokens = self.tokens.issue_pair(&user).await?;
        Ok(AuthResponse {
            user: user.sanitized(),
            tokens,
        })
    }

    /// Shared login side effects: last-login, device session, audit entry
    /// and the async fraud device-count check.
    async fn complete_login(
        &self,
        user: &User,
        ip_address: Option<String>,
    ) -> Result<(), ServiceError> {
        self.db.update_last_login(user.user_id).await?;
        self.db
            .insert_device_session(&DeviceSession::new(user.user_id))
            .await?;

        self.audit(AuditEvent::new(
            Some(user.user_id),
            AuditAction::UserLogin,
            Some("user"),
            Some(user.user_id),
            None,
            ip_address,
        ))
        .await;

        let fraud = self.fraud.clone();
        let user_id = user.user_id;
        self.tasks.submit("login_device_check", async move {
            fraud
                .on_login_device_check(user_id)
                .await
                .map_err(Into::into)
        });

        Ok(())
    }

    /// Exchange a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let pair = self.tokens.rotate(refresh_token).await?;

        // Keep the newest device session's last-seen roughly current.
        if let Ok(claims) = self.tokens.signer().verify_refresh(&pair.refresh_token) {
            if let Ok(user_id) = claims.sub.parse::<Uuid>() {
                let db = self.db.clone();
                self.tasks.submit("touch_device_session", async move {
                    db.touch_latest_device_session(user_id)
                        .await
                        .map_err(Into::into)
                });
            }
        }

        Ok(pair)
    }

    /// Revoke one refresh token. Idempotent.
    pub async fn logout(
        &self,
        refresh_token: &str,
        ip_address: Option<String>,
    ) -> Result<(), ServiceError> {
        let actor = self
            .tokens
            .signer()
            .verify_refresh(refresh_token)
            .ok()
            .and_then(|claims| claims.sub.parse::<Uuid>().ok());

        self.tokens.revoke(refresh_token).await?;

        self.audit(AuditEvent::new(
            actor,
            AuditAction::UserLogout,
            actor.map(|_| "user"),
            actor,
            None,
            ip_address,
        ))
        .await;

        Ok(())
    }

    /// Revoke every refresh token for a user ("log out everywhere").
    pub async fn logout_all(
        &self,
        user_id: Uuid,
        ip_address: Option<String>,
    ) -> Result<(), ServiceError> {
        self.tokens.revoke_all_for_user(user_id).await?;

        self.audit(AuditEvent::new(
            Some(user_id),
            AuditAction::UserLogout,
            Some("user"),
            Some(user_id),
            Some(json!({ "scope": "all_sessions" })),
            ip_address,
        ))
        .await;

        Ok(())
    }

    /// Start a password reset. The response is identical whether or not the
    /// email exists.
    #[tracing::instrument(skip(self))]
    pub async fn forgot_password(
        &self,
        email: &str,
        ip_address: Option<String>,
    ) -> Result<&'static str, ServiceError> {
        if let Some(user) = self.db.find_user_by_email(email).await? {
            if user.is_active() {
                let reset_token = self.tokens.mint_reset_token(&user).await?;
                self.email
                    .send_password_reset_email(&user.email, &reset_token)
                    .await?;

                self.audit(AuditEvent::new(
                    Some(user.user_id),
                    AuditAction::PasswordResetRequested,
                    Some("user"),
                    Some(user.user_id),
                    None,
                    ip_address,
                ))
                .await;

                tracing::info!(user_id = %user.user_id, "Password reset requested");
            }
        }

        Ok(NEUTRAL_RESET_MESSAGE)
    }

    /// Complete a password reset with a single-use token. Refresh tokens
    /// are only revoked once the reset actually succeeds.
    #[tracing::instrument(skip(self, reset_token, new_password))]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: String,
        ip_address: Option<String>,
    ) -> Result<(), ServiceError> {
        let user_id = self.tokens.consume_reset_token(reset_token).await?;

        let password_hash = hash_password(&Password::new(new_password), self.hash_time_cost)?;
        self.db
            .update_password_hash(user_id, password_hash.as_str())
            .await?;
        self.tokens.revoke_all_for_user(user_id).await?;

        self.audit(AuditEvent::new(
            Some(user_id),
            AuditAction::PasswordResetCompleted,
            Some("user"),
            Some(user_id),
            None,
            ip_address,
        ))
        .await;

        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }

    /// Change password with the current one as proof; forces re-login
    /// everywhere.
    #[tracing::instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: String,
        new_password: String,
        ip_address: Option<String>,
    ) -> Result<(), ServiceError> {
        let user = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        verify_password(
            &Password::new(current_password),
            &PasswordHashString::new(user.password_hash_text.clone()),
        )
        .map_err(|_| ServiceError::InvalidPassword)?;

        let password_hash = hash_password(&Password::new(new_password), self.hash_time_cost)?;
        self.db
            .update_password_hash(user_id, password_hash.as_str())
            .await?;
        self.tokens.revoke_all_for_user(user_id).await?;

        self.audit(AuditEvent::new(
            Some(user_id),
            AuditAction::PasswordChanged,
            Some("user"),
            Some(user_id),
            None,
            ip_address,
        ))
        .await;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    // ==================== OTP flows ====================

    pub async fn send_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<OtpSent, ServiceError> {
        self.otp.send_otp(channel, destination).await
    }

    pub async fn resend_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<OtpSent, ServiceError> {
        self.otp.resend_otp(channel, destination).await
    }

    /// Verify a one-time code. The phone flow behaves like a login and gets
    /// the same side effects.
    pub async fn verify_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
        code: &str,
        ip_address: Option<String>,
    ) -> Result<OtpVerifyResponse, ServiceError> {
        match self.otp.verify_otp(channel, destination, code).await? {
            OtpOutcome::Session { user, tokens } => {
                self.complete_login(&user, ip_address.clone()).await?;

                self.audit(AuditEvent::new(
                    Some(user.user_id),
                    AuditAction::OtpVerified,
                    Some("user"),
                    Some(user.user_id),
                    Some(json!({ "channel": channel.as_str() })),
                    ip_address,
                ))
                .await;

                Ok(OtpVerifyResponse::Session {
                    user: user.sanitized(),
                    tokens,
                })
            }
            OtpOutcome::ResetToken { reset_token } => Ok(OtpVerifyResponse::Reset {
                message: "Code verified. Use the reset token to set a new password.".to_string(),
                reset_token,
            }),
        }
    }

    // ==================== Profile ====================

    pub async fn get_me(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let user = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        Ok(user.sanitized())
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<DeviceSession>, ServiceError> {
        self.db.list_device_sessions(user_id).await
    }

    /// Audit writes are always attempted; their failure never fails the flow.
    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.db.insert_audit_event(&event).await {
            tracing::error!(error = %e, action = %event.action_code, "Failed to write audit event");
        }
    }
}
