//! OTP verification subsystem.
//!
//! Two flows share one mechanism: phone codes (registration/login) and
//! email codes (password-reset initiation). Only code hashes are stored,
//! issuance is throttled per destination, and every request carries a
//! bounded attempt budget.

use chrono::Utc;
use std::sync::Arc;

use crate::config::OtpConfig;
use crate::models::{OtpChannel, OtpCheck, OtpRequest, User};
use crate::services::{
    metrics, BackgroundTasks, Database, EmailProvider, ServiceError, SmsProvider, TokenManager,
    TokenPair,
};
use crate::utils::crypto::{generate_otp, generate_token, hash_token};
use crate::utils::{hash_password, Password};

/// Issued-code receipt returned to the caller.
#[derive(Debug)]
pub struct OtpSent {
    pub expires_in: i64,
}

/// What a successful verification produced.
pub enum OtpOutcome {
    /// Phone flow: the caller is now logged in.
    Session { user: User, tokens: TokenPair },
    /// Email flow: a single-use password-reset token.
    ResetToken { reset_token: String },
}

#[derive(Clone)]
pub struct OtpService {
    db: Database,
    tokens: TokenManager,
    email: Arc<dyn EmailProvider>,
    sms: Arc<dyn SmsProvider>,
    tasks: BackgroundTasks,
    config: OtpConfig,
    hash_time_cost: u32,
}

impl OtpService {
    pub fn new(
        db: Database,
        tokens: TokenManager,
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        tasks: BackgroundTasks,
        config: OtpConfig,
        hash_time_cost: u32,
    ) -> Self {
        Self {
            db,
            tokens,
            email,
            sms,
            tasks,
            config,
            hash_time_cost,
        }
    }

    /// Issue a one-time code for a destination, honoring the cooldown.
    #[tracing::instrument(skip(self), fields(channel = ?channel))]
    pub async fn send_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<OtpSent, ServiceError> {
        self.send_inner(channel, destination, false).await
    }

    /// Expire any outstanding unverified request, then reissue. The expired
    /// request no longer counts toward the cooldown.
    #[tracing::instrument(skip(self), fields(channel = ?channel))]
    pub async fn resend_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<OtpSent, ServiceError> {
        self.db.expire_pending_otps(channel, destination).await?;
        self.send_inner(channel, destination, true).await
    }

    async fn send_inner(
        &self,
        channel: OtpChannel,
        destination: &str,
        bypass_cooldown: bool,
    ) -> Result<OtpSent, ServiceError> {
        validate_destination(channel, destination)?;

        if !bypass_cooldown {
            if let Some(created) = self.db.latest_otp_created_utc(channel, destination).await? {
                let elapsed = (Utc::now() - created).num_seconds();
                let cooldown = self.config.cooldown_seconds;
                if elapsed < cooldown {
                    return Err(ServiceError::OtpCooldown {
                        retry_after_seconds: (cooldown - elapsed).max(1) as u64,
                    });
                }
            }
        }

        // Email codes initiate password reset; they are only meaningful for
        // an existing account. Phone codes may auto-provision on verify.
        let user_id = match channel {
            OtpChannel::Email => Some(
                self.db
                    .find_user_by_email(destination)
                    .await?
                    .ok_or(ServiceError::UserNotFound)?
                    .user_id,
            ),
            OtpChannel::Phone => self
                .db
                .find_user_by_phone(destination)
                .await?
                .map(|u| u.user_id),
        };

        let code = generate_otp(self.config.length);
        let otp = OtpRequest::new(
            user_id,
            channel,
            destination.to_string(),
            hash_token(&code),
            self.config.expiry_seconds,
        );
        self.db.insert_otp_request(&otp).await?;

        match channel {
            OtpChannel::Phone => {
                // SMS delivery is fire-and-forget; failures are logged by
                // the background queue, never surfaced.
                let sms = self.sms.clone();
                let to = destination.to_string();
                let body = format!("Your marketplace verification code is {}", code);
                self.tasks.submit("otp_sms", async move {
                    sms.send_sms(&to, &body).await.map_err(Into::into)
                });
            }
            OtpChannel::Email => {
                // The email path must surface delivery failure.
                self.email.send_otp_email(destination, &code).await?;
            }
        }

        metrics::inc_labeled(&metrics::OTP_SENT_TOTAL, channel.as_str());
        tracing::info!(otp_id = %otp.otp_id, "OTP issued");

        Ok(OtpSent {
            expires_in: self.config.expiry_seconds,
        })
    }

    /// Verify a submitted code against the most recent live request for the
    /// destination. Wrong codes spend that request's attempt budget.
    #[tracing::instrument(skip(self, code), fields(channel = ?channel))]
    pub async fn verify_otp(
        &self,
        channel: OtpChannel,
        destination: &str,
        code: &str,
    ) -> Result<OtpOutcome, ServiceError> {
        let otp = self
            .db
            .find_latest_pending_otp(channel, destination)
            .await?
            .ok_or(ServiceError::InvalidOtp)?;

        match otp.check(&hash_token(code), self.config.max_attempts) {
            OtpCheck::Match => {
                // Single-use: a concurrent verify of the same code loses here.
                let updated = self.db.mark_otp_verified(otp.otp_id).await?;
                if updated == 0 {
                    return Err(ServiceError::InvalidOtp);
                }
            }
            OtpCheck::Mismatch => {
                // Penalize guessing before reporting failure.
                self.db.increment_otp_attempts(otp.otp_id).await?;
                return Err(ServiceError::InvalidOtp);
            }
            OtpCheck::Exhausted | OtpCheck::Expired | OtpCheck::AlreadyVerified => {
                return Err(ServiceError::InvalidOtp);
            }
        }

        metrics::inc_labeled(&metrics::OTP_VERIFIED_TOTAL, channel.as_str());

        match channel {
            OtpChannel::Phone => {
                let user = self.find_or_create_phone_user(destination).await?;
                let tokens = self.tokens.issue_pair(&user).await?;
                Ok(OtpOutcome::Session { user, tokens })
            }
            OtpChannel::Email => {
                let user = self
                    .db
                    .find_user_by_email(destination)
                    .await?
                    .ok_or(ServiceError::InvalidOtp)?;
                if user.blocked_flag {
                    return Err(ServiceError::UserBlocked);
                }
                if user.deleted_flag {
                    return Err(ServiceError::UserDeleted);
                }
                let reset_token = self.tokens.mint_reset_token(&user).await?;
                Ok(OtpOutcome::ResetToken { reset_token })
            }
        }
    }

    /// Resolve the account behind a verified phone number, provisioning one
    /// on first verification. The store's unique constraints are the real
    /// arbiter for concurrent first-time verifications: losing the insert
    /// race falls back to the winner's row.
    async fn find_or_create_phone_user(&self, phone: &str) -> Result<User, ServiceError> {
        if let Some(user) = self.db.find_user_by_phone(phone).await? {
            if user.blocked_flag {
                return Err(ServiceError::UserBlocked);
            }
            if user.deleted_flag {
                return Err(ServiceError::UserDeleted);
            }
            if !user.verified_flag {
                self.db.mark_user_verified(user.user_id).await?;
            }
            return Ok(user);
        }

        let placeholder_email = format!(
            "{}@{}",
            phone.trim_start_matches('+'),
            self.config.phone_account_email_domain
        );
        // The account has no usable password until the user sets one; an
        // unguessable random one keeps the column non-null.
        let random_password = Password::new(generate_token(16));
        let password_hash = hash_password(&random_password, self.hash_time_cost)?;

        let mut user = User::new(
            placeholder_email,
            Some(phone.to_string()),
            password_hash.into_string(),
            "user".to_string(),
            None,
        );
        user.verified_flag = true;

        match self.db.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.user_id, "Auto-provisioned account for verified phone");
                Ok(user)
            }
            Err(ServiceError::PhoneExists) | Err(ServiceError::EmailExists) => self
                .db
                .find_user_by_phone(phone)
                .await?
                .ok_or(ServiceError::InvalidOtp),
            Err(e) => Err(e),
        }
    }

    pub fn cooldown_seconds(&self) -> i64 {
        self.config.cooldown_seconds
    }
}

fn validate_destination(channel: OtpChannel, destination: &str) -> Result<(), ServiceError> {
    match channel {
        OtpChannel::Email => {
            if !destination.contains('@') || !destination.contains('.') {
                return Err(ServiceError::InvalidDestination(
                    "expected an email address".to_string(),
                ));
            }
        }
        OtpChannel::Phone => {
            if !destination.starts_with('+') || destination.len() < 10 {
                return Err(ServiceError::InvalidDestination(
                    "expected an E.164 phone number (+1234567890)".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination(OtpChannel::Email, "a@b.example").is_ok());
        assert!(validate_destination(OtpChannel::Email, "not-an-email").is_err());
        assert!(validate_destination(OtpChannel::Phone, "+15550001111").is_ok());
        assert!(validate_destination(OtpChannel::Phone, "5550001111").is_err());
        assert!(validate_destination(OtpChannel::Phone, "+1555").is_err());
    }
}
