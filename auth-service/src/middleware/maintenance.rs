use axum::{extract::{Request, State}, middleware::Next, response::Response};

use crate::AppState;
use service_core::error::AppError;

/// Reject writes while the platform is in maintenance mode. Health and
/// metrics stay reachable so operators can watch the maintenance window.
pub async fn maintenance_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();
    if path == "/health" || path == "/metrics" {
        return Ok(next.run(req).await);
    }

    if state.maintenance.maintenance_enabled().await {
        return Err(AppError::ServiceUnavailable);
    }

    Ok(next.run(req).await)
}
