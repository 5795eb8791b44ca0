use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::{services::AccessTokenClaims, services::ServiceError, AppState};

#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    /// Stable code so clients can tell an expired token (worth a silent
    /// refresh) from an invalid one (re-login).
    pub code: &'static str,
}

/// Middleware to require a bearer access token.
///
/// Verification is purely cryptographic - no store round-trip.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<AuthErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(AuthErrorResponse {
                    error: "Missing or invalid Authorization header".to_string(),
                    code: "missing_token",
                }),
            ));
        }
    };

    let claims = match state.tokens.signer().verify_access(token) {
        Ok(claims) => claims,
        Err(ServiceError::TokenExpired) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(AuthErrorResponse {
                    error: "Access token expired".to_string(),
                    code: "token_expired",
                }),
            ));
        }
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(AuthErrorResponse {
                    error: "Invalid token".to_string(),
                    code: "token_invalid",
                }),
            ));
        }
    };

    // Store claims in request extensions so handlers can access them
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor to easily get claims in handlers
pub struct AuthUser(pub AccessTokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<AuthErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AccessTokenClaims>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AuthErrorResponse {
                error: "Auth claims missing from request extensions".to_string(),
                code: "missing_claims",
            }),
        ))?;

        Ok(AuthUser(claims.clone()))
    }
}

/// Require the admin role on an already-authenticated request.
pub fn require_admin(claims: &AccessTokenClaims) -> Result<(), service_core::error::AppError> {
    if claims.role != "admin" {
        return Err(service_core::error::AppError::Forbidden(anyhow::anyhow!(
            "Administrator role required"
        )));
    }
    Ok(())
}
