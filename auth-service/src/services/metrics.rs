use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static LOGIN_SUCCESS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static LOGIN_FAILURE_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static OTP_SENT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static OTP_VERIFIED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static FRAUD_LOGS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HIGH_RISK_FLAGS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let login_success = IntCounter::new("auth_login_success_total", "Successful logins")
        .expect("valid metric definition");
    let login_failure = IntCounter::new("auth_login_failure_total", "Failed login attempts")
        .expect("valid metric definition");
    let otp_sent = IntCounterVec::new(
        Opts::new("auth_otp_sent_total", "One-time codes dispatched"),
        &["channel"],
    )
    .expect("valid metric definition");
    let otp_verified = IntCounterVec::new(
        Opts::new("auth_otp_verified_total", "One-time codes verified"),
        &["channel"],
    )
    .expect("valid metric definition");
    let fraud_logs = IntCounterVec::new(
        Opts::new("fraud_logs_total", "Fraud rule hits logged"),
        &["rule"],
    )
    .expect("valid metric definition");
    let high_risk_flags = IntCounter::new(
        "fraud_high_risk_flags_total",
        "Users flagged as high risk",
    )
    .expect("valid metric definition");

    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(login_success.clone()),
        Box::new(login_failure.clone()),
        Box::new(otp_sent.clone()),
        Box::new(otp_verified.clone()),
        Box::new(fraud_logs.clone()),
        Box::new(high_risk_flags.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::error!("Failed to register metric: {}", e);
        }
    }

    let _ = LOGIN_SUCCESS_TOTAL.set(login_success);
    let _ = LOGIN_FAILURE_TOTAL.set(login_failure);
    let _ = OTP_SENT_TOTAL.set(otp_sent);
    let _ = OTP_VERIFIED_TOTAL.set(otp_verified);
    let _ = FRAUD_LOGS_TOTAL.set(fraud_logs);
    let _ = HIGH_RISK_FLAGS_TOTAL.set(high_risk_flags);
    let _ = REGISTRY.set(registry);
}

/// Render all registered metrics in the Prometheus text format.
pub fn render_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Increment a counter if metrics are initialized.
pub fn inc(counter: &OnceLock<IntCounter>) {
    if let Some(c) = counter.get() {
        c.inc();
    }
}

/// Increment a labeled counter if metrics are initialized.
pub fn inc_labeled(counter: &OnceLock<IntCounterVec>, label: &str) {
    if let Some(c) = counter.get() {
        c.with_label_values(&[label]).inc();
    }
}
