mod health;
mod metrics;

pub use health::healthcheck;
pub use metrics::metrics_handler;

use crate::telemetry::Metrics;
use axum::{routing::get, Router};
use std::sync::Arc;

/// `/health` and `/metrics`, shared by every service.
pub fn core_routes(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}
