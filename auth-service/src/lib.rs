pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AuthConfig;
use crate::services::{
    AuthService, Database, FraudService, MaintenanceCache, TokenManager,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::otp::send_otp,
        handlers::otp::verify_otp,
        handlers::otp::resend_otp,
        handlers::user::get_me,
        handlers::user::change_password,
        handlers::user::list_sessions,
        handlers::user::logout_all,
        handlers::fraud::list_fraud_logs,
        handlers::fraud::get_user_fraud_logs,
        handlers::fraud::list_high_risk_users,
        handlers::fraud::review_fraud_log,
    ),
    components(
        schemas(
            models::user::RegisterRequest,
            models::user::LoginRequest,
            models::user::UserResponse,
            models::device_session::DeviceSession,
            models::fraud_log::FraudLog,
            models::fraud_log::HighRiskUser,
            models::otp_request::OtpChannel,
            models::role::RoleRef,
            services::TokenPair,
            services::AuthResponse,
            services::OtpVerifyResponse,
            handlers::auth::RefreshRequest,
            handlers::auth::LogoutRequest,
            handlers::auth::ForgotPasswordRequest,
            handlers::auth::ResetPasswordRequest,
            handlers::auth::MessageResponse,
            handlers::otp::SendOtpRequest,
            handlers::otp::VerifyOtpRequest,
            handlers::otp::SendOtpResponse,
            handlers::user::ChangePasswordRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token lifecycle"),
        (name = "OTP", description = "One-time codes for phone and email flows"),
        (name = "User", description = "Authenticated profile operations"),
        (name = "Fraud", description = "Operator queries over the fraud risk engine"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub db: Database,
    pub tokens: TokenManager,
    pub auth: AuthService,
    pub fraud: FraudService,
    pub maintenance: MaintenanceCache,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub otp_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Throttled route groups
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let forgot_password_route = Router::new()
        .route(
            "/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let otp_routes = Router::new()
        .route("/auth/otp/send", post(handlers::otp::send_otp))
        .route("/auth/otp/verify", post(handlers::otp::verify_otp))
        .route("/auth/otp/resend", post(handlers::otp::resend_otp))
        .layer(from_fn_with_state(
            state.otp_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Routes requiring a valid access token
    let authed_routes = Router::new()
        .route("/users/me", get(handlers::user::get_me))
        .route("/users/me/password", post(handlers::user::change_password))
        .route("/users/me/sessions", get(handlers::user::list_sessions))
        .route("/auth/logout-all", post(handlers::user::logout_all))
        .route("/fraud/logs", get(handlers::fraud::list_fraud_logs))
        .route(
            "/fraud/logs/:fraud_log_id/review",
            post(handlers::fraud::review_fraud_log),
        )
        .route(
            "/fraud/users/:user_id/logs",
            get(handlers::fraud::get_user_fraud_logs),
        )
        .route(
            "/fraud/high-risk-users",
            get(handlers::fraud::list_high_risk_users),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        crate::config::Environment::Dev => true,
        crate::config::Environment::Prod => {
            state.config.swagger.enabled == crate::config::SwaggerMode::Public
        }
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .merge(login_route)
        .merge(register_route)
        .merge(forgot_password_route)
        .merge(otp_routes)
        .merge(authed_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        // Maintenance window gate
        .layer(from_fn_with_state(state.clone(), middleware::maintenance_gate))
        // Tracing span per request
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up"
        }
    })))
}
