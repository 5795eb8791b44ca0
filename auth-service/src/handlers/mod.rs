//! HTTP handlers: thin shells over the auth orchestrator and fraud engine.

pub mod auth;
pub mod fraud;
pub mod metrics;
pub mod otp;
pub mod user;
