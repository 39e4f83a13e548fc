use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status (`ok` or `degraded`).
    pub status: String,
    /// Number of live sessions in the registry.
    pub sessions: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            sessions,
        }
    }

    /// Create a health response indicating the storage backend is failing.
    pub fn degraded(sessions: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            sessions,
        }
    }
}
