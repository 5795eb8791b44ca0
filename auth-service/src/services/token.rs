//! Session/token manager: signed bearer token pairs, refresh rotation and
//! password-reset token lifecycle.
//!
//! Access and refresh tokens are self-contained HS256 JWTs signed with
//! independent secrets; verifying one never touches the store. Only
//! rotation and revocation read or write refresh-session rows.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{PasswordResetToken, RefreshSession, User};
use crate::services::{Database, ServiceError};
use crate::utils::crypto::{generate_token, hash_token};

/// Claims for access tokens (short-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Role code
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, ServiceError> {
        self.sub.parse().map_err(|_| ServiceError::InvalidToken)
    }
}

/// Claims for refresh tokens (long-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Token ID
    pub jti: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Token pair returned to the client. The raw refresh token appears here
/// once and is never stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Pure signer/verifier. Holds no store handle, so verification stays O(1)
/// and horizontally scalable.
#[derive(Clone)]
pub struct TokenSigner {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl TokenSigner {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Sign an access token for a user.
    pub fn issue_access(&self, user: &User) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            role: user.role_code.clone(),
            exp: (now + Duration::minutes(self.access_token_expiry_minutes)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign_access_claims(&claims)
    }

    fn sign_access_claims(&self, claims: &AccessTokenClaims) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.access_encoding)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    /// Sign a refresh token for a user.
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::days(self.refresh_token_expiry_days)).timestamp(),
            iat: now.timestamp(),
        };
        self.sign_refresh_claims(&claims)
    }

    fn sign_refresh_claims(&self, claims: &RefreshTokenClaims) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.refresh_encoding)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode refresh token: {}", e)))
    }

    /// Verify an access token. `TokenExpired` and `InvalidToken` are
    /// distinct so callers can decide whether a silent refresh is worth
    /// attempting.
    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<AccessTokenClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims)
            .map_err(classify_jwt_error)
    }

    /// Verify a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .map_err(classify_jwt_error)
    }

    /// Access token expiry in seconds (for client info).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    pub fn refresh_token_expiry_days(&self) -> i64 {
        self.refresh_token_expiry_days
    }
}

fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> ServiceError {
    match err.kind() {
        ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
        _ => ServiceError::InvalidToken,
    }
}

/// Owns every RefreshSession and PasswordResetToken write.
#[derive(Clone)]
pub struct TokenManager {
    signer: TokenSigner,
    db: Database,
    reset_token_expiry_minutes: i64,
}

impl TokenManager {
    pub fn new(signer: TokenSigner, db: Database, reset_token_expiry_minutes: i64) -> Self {
        Self {
            signer,
            db,
            reset_token_expiry_minutes,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issue a fresh token pair, persisting only the refresh token's hash.
    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair, ServiceError> {
        let access_token = self.signer.issue_access(user)?;
        let refresh_token = self.signer.issue_refresh(user.user_id)?;

        let session = RefreshSession::new(
            user.user_id,
            hash_token(&refresh_token),
            self.signer.refresh_token_expiry_days(),
        );
        self.db.insert_refresh_session(&session).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.signer.access_token_expiry_seconds(),
        })
    }

    /// Rotate a refresh token: revoke the old session, issue a new pair.
    ///
    /// The revoke is a conditional update; of two concurrent rotations of
    /// the same token exactly one wins and the loser gets `InvalidToken`.
    pub async fn rotate(&self, old_raw: &str) -> Result<TokenPair, ServiceError> {
        // Signature/expiry check first; expired tokens report as such.
        let _claims = self.signer.verify_refresh(old_raw)?;

        let session = self
            .db
            .find_live_refresh_session(&hash_token(old_raw))
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let revoked = self.db.revoke_refresh_session(session.session_id).await?;
        if revoked == 0 {
            return Err(ServiceError::InvalidToken);
        }

        let user = self
            .db
            .find_user_by_id(session.user_id)
            .await?
            .ok_or(ServiceError::InvalidToken)?;
        if user.blocked_flag {
            return Err(ServiceError::UserBlocked);
        }
        if user.deleted_flag {
            return Err(ServiceError::UserDeleted);
        }

        tracing::info!(user_id = %user.user_id, "Refresh token rotated");
        self.issue_pair(&user).await
    }

    /// Revoke the session behind a raw refresh token. Idempotent: unknown
    /// or already-revoked tokens are a no-op.
    pub async fn revoke(&self, raw: &str) -> Result<(), ServiceError> {
        if let Some(session) = self.db.find_live_refresh_session(&hash_token(raw)).await? {
            self.db.revoke_refresh_session(session.session_id).await?;
            tracing::info!(user_id = %session.user_id, "Refresh session revoked");
        }
        Ok(())
    }

    /// Revoke every live session for a user. Idempotent.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let revoked = self.db.revoke_all_user_sessions(user_id).await?;
        if revoked > 0 {
            tracing::info!(user_id = %user_id, revoked, "Revoked all refresh sessions");
        }
        Ok(revoked)
    }

    /// Mint a single-use password reset token, invalidating any prior
    /// active one. Returns the raw token; only its hash is stored.
    pub async fn mint_reset_token(&self, user: &User) -> Result<String, ServiceError> {
        self.db.invalidate_active_reset_tokens(user.user_id).await?;

        let raw = generate_token(32);
        let token = PasswordResetToken::new(
            user.user_id,
            hash_token(&raw),
            self.reset_token_expiry_minutes,
        );
        self.db.insert_reset_token(&token).await?;

        Ok(raw)
    }

    /// Consume a reset token. Fails with `InvalidToken` unless an unused,
    /// unexpired hash matches; marking used is conditional and terminal.
    pub async fn consume_reset_token(&self, raw: &str) -> Result<Uuid, ServiceError> {
        let token = self
            .db
            .find_active_reset_token(&hash_token(raw))
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let consumed = self.db.consume_reset_token(token.reset_id).await?;
        if consumed == 0 {
            return Err(ServiceError::InvalidToken);
        }

        Ok(token.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret-for-tests-only".to_string(),
            refresh_secret: "refresh-secret-for-tests-only".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn test_user() -> User {
        User::new(
            "seller@example.com".to_string(),
            None,
            "hash".to_string(),
            "designer".to_string(),
            None,
        )
    }

    #[test]
    fn test_access_token_round_trip() {
        let signer = TokenSigner::new(&test_config());
        let user = test_user();

        let token = signer.issue_access(&user).unwrap();
        let claims = signer.verify_access(&token).unwrap();

        assert_eq!(claims.sub, user.user_id.to_string());
        assert_eq!(claims.email, "seller@example.com");
        assert_eq!(claims.role, "designer");
        assert_eq!(claims.user_id().unwrap(), user.user_id);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let signer = TokenSigner::new(&test_config());
        let user_id = Uuid::new_v4();

        let token = signer.issue_refresh(user_id).unwrap();
        let claims = signer.verify_refresh(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn test_independent_secrets() {
        let signer = TokenSigner::new(&test_config());
        let user = test_user();

        // An access token does not verify as a refresh token and vice versa.
        let access = signer.issue_access(&user).unwrap();
        assert!(matches!(
            signer.verify_refresh(&access),
            Err(ServiceError::InvalidToken)
        ));

        let refresh = signer.issue_refresh(user.user_id).unwrap();
        assert!(matches!(
            signer.verify_access(&refresh),
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_access_token_is_distinguished() {
        let signer = TokenSigner::new(&test_config());
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            email: "seller@example.com".to_string(),
            role: "user".to_string(),
            // Past the default validation leeway.
            exp: (now - Duration::minutes(10)).timestamp(),
            iat: (now - Duration::minutes(25)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = signer.sign_access_claims(&claims).unwrap();

        assert!(matches!(
            signer.verify_access(&token),
            Err(ServiceError::TokenExpired)
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid_not_expired() {
        let signer = TokenSigner::new(&test_config());
        assert!(matches!(
            signer.verify_access("not-a-jwt"),
            Err(ServiceError::InvalidToken)
        ));
    }
}
