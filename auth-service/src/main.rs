use auth_service::{
    build_router,
    config::AuthConfig,
    services::{
        AuthService, BackgroundTasks, Database, FraudService, HttpNotificationClient,
        HttpSmsGateway, MaintenanceCache, OtpService, SmtpEmailService, TokenManager, TokenSigner,
    },
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    auth_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authentication service"
    );

    // Database pool + migrations
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            service_core::error::AppError::DatabaseError(anyhow::anyhow!(
                "Failed to connect to Postgres: {}",
                e
            ))
        })?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| {
            service_core::error::AppError::DatabaseError(anyhow::anyhow!(
                "Failed to run migrations: {}",
                e
            ))
        })?;
    tracing::info!("Database initialized");

    let db = Database::new(pool, Duration::from_millis(config.database.query_timeout_ms));

    // Delivery collaborators
    let email = Arc::new(SmtpEmailService::new(&config.smtp).map_err(anyhow::Error::from)?);
    let sms = Arc::new(HttpSmsGateway::new(&config.sms).map_err(anyhow::Error::from)?);
    let notify =
        Arc::new(HttpNotificationClient::new(&config.notifications.base_url)
            .map_err(anyhow::Error::from)?);

    // Core services
    let tasks = BackgroundTasks::spawn_worker();
    let signer = TokenSigner::new(&config.jwt);
    let tokens = TokenManager::new(
        signer,
        db.clone(),
        config.security.reset_token_expiry_minutes,
    );
    let otp = OtpService::new(
        db.clone(),
        tokens.clone(),
        email.clone(),
        sms.clone(),
        tasks.clone(),
        config.otp.clone(),
        config.security.password_hash_time_cost,
    );
    let fraud = FraudService::new(db.clone(), config.fraud.clone());
    let auth = AuthService::new(
        db.clone(),
        tokens.clone(),
        otp,
        fraud.clone(),
        email,
        notify,
        tasks.clone(),
        config.security.password_hash_time_cost,
    );
    let maintenance = MaintenanceCache::new(
        db.clone(),
        Duration::from_secs(config.maintenance_cache_ttl_seconds),
    );

    // Rate limiters
    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let register_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.register_attempts,
        config.rate_limit.register_window_seconds,
    );
    let otp_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.otp_attempts,
        config.rate_limit.otp_window_seconds,
    );
    let password_reset_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.password_reset_attempts,
        config.rate_limit.password_reset_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );

    // Periodic fraud sweep. The scheduler is plain timer glue; the sweep
    // itself is idempotent against re-runs.
    let sweep_interval = Duration::from_secs(config.fraud.sweep_interval_seconds);
    let sweep_fraud = fraud.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = sweep_fraud.sweep().await {
                tracing::error!(error = %e, "Fraud sweep failed");
            }
        }
    });

    let state = AppState {
        config: config.clone(),
        db,
        tokens,
        auth,
        fraud,
        maintenance,
        login_rate_limiter,
        register_rate_limiter,
        otp_rate_limiter,
        password_reset_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = config.common.bind_addr();
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
