/// Metrics and telemetry for befriends
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP and GraphQL request counts and latencies
/// - Friend relationship transitions
/// - Notification delivery outcomes
/// - Pub/sub bus traffic

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    Gauge, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== GraphQL Metrics ==========

    /// GraphQL operations by kind (query, mutation, subscription) and outcome
    pub static ref GRAPHQL_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "graphql_requests_total",
        "Total number of GraphQL operations",
        &["kind", "outcome"]
    )
    .unwrap();

    /// Open GraphQL subscription streams
    pub static ref GRAPHQL_SUBSCRIPTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "graphql_subscriptions_active",
        "Number of live GraphQL subscription connections"
    )
    .unwrap();

    // ========== Relationship Metrics ==========

    /// Friend relationship transitions by operation
    pub static ref RELATIONSHIP_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "relationship_transitions_total",
        "Total number of friend relationship transitions",
        &["transition"]
    )
    .unwrap();

    // ========== Notification Metrics ==========

    /// Notification pipeline outcomes by type
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notifications_total",
        "Notifications by type and outcome (delivered, suppressed, failed)",
        &["type", "outcome"]
    )
    .unwrap();

    // ========== Activity Metrics ==========

    /// Activities recorded by type
    pub static ref ACTIVITIES_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "activities_recorded_total",
        "Total number of activities recorded",
        &["type"]
    )
    .unwrap();

    // ========== Pub/Sub Metrics ==========

    /// Events published by topic family
    pub static ref BUS_EVENTS_PUBLISHED: IntCounterVec = register_int_counter_vec!(
        "bus_events_published_total",
        "Total number of events published on the pub/sub bus",
        &["topic"]
    )
    .unwrap();

    // ========== Rate Limiting Metrics ==========

    /// Requests rejected by the rate limiter
    pub static ref RATE_LIMIT_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limit_rejections_total",
        "Total number of requests rejected by the rate limiter",
        &["tier"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a GraphQL operation
pub fn record_graphql_request(kind: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    GRAPHQL_REQUESTS_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

/// Record a friend relationship transition
pub fn record_relationship_transition(transition: &str) {
    RELATIONSHIP_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
}

/// Record a notification pipeline outcome
pub fn record_notification(notification_type: &str, outcome: &str) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[notification_type, outcome])
        .inc();
}

/// Record an activity
pub fn record_activity(activity_type: &str) {
    ACTIVITIES_RECORDED_TOTAL
        .with_label_values(&[activity_type])
        .inc();
}

/// Record a rate-limited request
pub fn record_rate_limit_rejection(tier: &str) {
    RATE_LIMIT_REJECTIONS_TOTAL.with_label_values(&[tier]).inc();
}
