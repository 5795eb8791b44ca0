pub mod auth;
pub mod maintenance;

pub use auth::{auth_middleware, require_admin, AuthUser};
pub use maintenance::maintenance_gate;
