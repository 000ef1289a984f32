use axum::Json;
use serde::Serialize;

/// Liveness payload. The model session is loaded before the listener binds,
/// so a process that answers is ready to serve.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
}

pub async fn healthcheck() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "Available",
    })
}
