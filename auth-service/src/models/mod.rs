pub mod audit_event;
pub mod device_session;
pub mod fraud_log;
pub mod otp_request;
pub mod refresh_session;
pub mod reset_token;
pub mod role;
pub mod user;

pub use audit_event::{AuditAction, AuditEvent};
pub use device_session::DeviceSession;
pub use fraud_log::{FraudLog, FraudRule, HighRiskUser};
pub use otp_request::{OtpChannel, OtpCheck, OtpRequest};
pub use refresh_session::RefreshSession;
pub use reset_token::PasswordResetToken;
pub use role::{Role, RoleRef};
pub use user::{LoginRequest, RegisterRequest, User, UserResponse};
