//! Services layer.
//!
//! Store accessor, token manager, OTP subsystem, fraud engine and the auth
//! orchestrator, plus the delivery collaborators they depend on.

mod auth;
mod database;
mod email;
pub mod error;
mod fraud;
mod maintenance;
pub mod metrics;
mod notify;
mod otp;
mod sms;
mod tasks;
mod token;

pub use auth::{AuthResponse, AuthService, OtpVerifyResponse, NEUTRAL_RESET_MESSAGE};
pub use database::Database;
pub use email::{EmailProvider, SmtpEmailService};
pub use error::ServiceError;
pub use fraud::{
    aggregate_score, check_many_devices, check_repeated_phone, check_repeated_rejection,
    check_too_many_listings, rejection_escalation, FraudService, RejectionEscalation, RuleHit,
    SweepSummary,
};
pub use maintenance::MaintenanceCache;
pub use notify::{HttpNotificationClient, NewNotification, NotificationSink};
pub use otp::{OtpOutcome, OtpSent, OtpService};
pub use sms::{HttpSmsGateway, SmsProvider};
pub use tasks::BackgroundTasks;
pub use token::{
    AccessTokenClaims, RefreshTokenClaims, TokenManager, TokenPair, TokenSigner,
};
