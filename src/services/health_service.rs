use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report service health, degrading when the storage backend is unreachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let sessions = state.registry().len();
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(sessions),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(sessions)
        }
    }
}
