/// Health check endpoints for liveness and readiness probes
///
/// Readiness requires the database to answer; the pub/sub bus is reported
/// for information only.
use crate::{
    context::AppContext,
    db,
    error::AppResult,
    metrics,
    pubsub::{Broadcaster, Topic},
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health/detailed", get(health_detailed))
}

/// Basic health check
pub async fn health_basic(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": ctx.config.service.version,
    }))
}

/// Liveness probe: responds whenever the process can serve a request
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 503 until the database answers
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = check_database(&ctx).await {
        tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Detailed health check with all component statuses
pub async fn health_detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let start = Instant::now();
    let checks = vec![check_database_detailed(&ctx).await, check_bus_detailed(&ctx)];

    let overall_status = determine_overall_status(&checks);
    let health = HealthStatus {
        status: overall_status.clone(),
        version: ctx.config.service.version.clone(),
        uptime_seconds: metrics::UPTIME_SECONDS.get(),
        checks,
        message: if overall_status == "healthy" {
            None
        } else {
            Some("One or more components are unhealthy".to_string())
        },
    };

    let status_code = match overall_status.as_str() {
        "healthy" | "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    tracing::info!(
        status = %overall_status,
        duration_ms = start.elapsed().as_millis(),
        "health_check_completed"
    );

    (status_code, Json(health))
}

async fn check_database(ctx: &AppContext) -> AppResult<()> {
    db::test_connection(&ctx.db).await
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    let result = check_database(ctx).await;
    let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(elapsed),
            error: None,
            details: Some(serde_json::json!({
                "type": "sqlite",
                "pool_size": ctx.db.size(),
            })),
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            response_time_ms: Some(elapsed),
            error: Some(e.public_message()),
            details: None,
        },
    }
}

fn check_bus_detailed(ctx: &AppContext) -> ComponentHealth {
    ComponentHealth {
        name: "pubsub".to_string(),
        status: "healthy".to_string(),
        response_time_ms: None,
        error: None,
        details: Some(serde_json::json!({
            "type": "in_memory",
            "relationship_subscribers": ctx.bus.subscriber_count(&Topic::RelationshipChanged),
            "activity_subscribers": ctx.bus.subscriber_count(&Topic::ActivityCreated),
        })),
    }
}

/// Determine overall health status from individual checks
fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy".to_string()
    } else if checks.iter().any(|c| c.status == "degraded") {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
