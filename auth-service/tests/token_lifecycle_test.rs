//! Token signer lifecycle tests: issuance, verification, expiry
//! discrimination and secret independence. These exercise the store-free
//! half of the token manager; rotation/revocation paths are covered against
//! a provisioned database environment.

use auth_service::config::JwtConfig;
use auth_service::models::User;
use auth_service::services::{ServiceError, TokenSigner};

fn signer() -> TokenSigner {
    TokenSigner::new(&JwtConfig {
        access_secret: "integration-access-secret".to_string(),
        refresh_secret: "integration-refresh-secret".to_string(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 7,
    })
}

fn sample_user() -> User {
    User::new(
        "lifecycle@example.com".to_string(),
        Some("+15550002222".to_string()),
        "$argon2id$stub".to_string(),
        "user".to_string(),
        Some("Lifecycle".to_string()),
    )
}

#[test]
fn access_token_claims_round_trip() {
    let signer = signer();
    let user = sample_user();

    let token = signer.issue_access(&user).expect("issue access token");
    let claims = signer.verify_access(&token).expect("verify access token");

    assert_eq!(claims.user_id().unwrap(), user.user_id);
    assert_eq!(claims.email, user.email);
    assert_eq!(claims.role, user.role_code);
    assert!(claims.exp > claims.iat);
    assert_eq!(claims.exp - claims.iat, 15 * 60);
}

#[test]
fn refresh_token_claims_round_trip() {
    let signer = signer();
    let user = sample_user();

    let token = signer.issue_refresh(user.user_id).expect("issue refresh token");
    let claims = signer.verify_refresh(&token).expect("verify refresh token");

    assert_eq!(claims.sub, user.user_id.to_string());
    assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
}

#[test]
fn tokens_are_unique_per_issue() {
    let signer = signer();
    let user = sample_user();

    let a = signer.issue_access(&user).unwrap();
    let b = signer.issue_access(&user).unwrap();
    // jti differs, so two tokens for the same user never collide.
    assert_ne!(a, b);
}

#[test]
fn cross_secret_verification_fails() {
    let signer = signer();
    let user = sample_user();

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
fn foreign_signer_tokens_are_rejected() {
    let ours = signer();
    let theirs = TokenSigner::new(&JwtConfig {
        access_secret: "some-other-access-secret".to_string(),
        refresh_secret: "some-other-refresh-secret".to_string(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 7,
    });

    let token = theirs.issue_access(&sample_user()).unwrap();
    assert!(matches!(
        ours.verify_access(&token),
        Err(ServiceError::InvalidToken)
    ));
}

#[test]
fn malformed_tokens_are_invalid() {
    let signer = signer();
    for garbage in ["", "abc", "a.b.c", "Bearer whatever"] {
        assert!(matches!(
            signer.verify_access(garbage),
            Err(ServiceError::InvalidToken)
        ));
        assert!(matches!(
            signer.verify_refresh(garbage),
            Err(ServiceError::InvalidToken)
        ));
    }
}
