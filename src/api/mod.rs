/// Operational HTTP routes: health probes and Prometheus metrics
pub mod health;
pub mod middleware;

use crate::{context::AppContext, metrics};
use axum::{http::header, response::IntoResponse, routing::get, Router};

/// Build operational routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .route("/metrics", get(metrics_handler))
}

/// GET /metrics
async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
