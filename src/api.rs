pub(crate) mod events;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{Router, routing::get};

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/events", get(events::stream))
        .with_state(state)
}
