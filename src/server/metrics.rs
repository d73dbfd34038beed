use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Tasteprint metrics
const PREFIX: &str = "tasteprint";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Pipeline Metrics
    pub static ref SYNC_OPERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_sync_operations_total"),
            "Pipeline operations by stage and outcome"
        ),
        &["operation", "outcome"]
    ).expect("Failed to create sync_operations_total metric");

    pub static ref CATALOG_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_catalog_requests_total"),
            "Requests to the upstream catalog by endpoint and outcome"
        ),
        &["endpoint", "outcome"]
    ).expect("Failed to create catalog_requests_total metric");

    pub static ref PLAYLISTS_CACHED: Gauge = Gauge::new(
        format!("{PREFIX}_playlists_cached"),
        "Number of playlist documents in the store"
    ).expect("Failed to create playlists_cached metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total errors by type and endpoint"),
        &["error_type", "endpoint"]
    ).expect("Failed to create errors_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_OPERATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PLAYLISTS_CACHED.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a pipeline operation outcome
pub fn record_sync_operation(operation: &str, outcome: &str) {
    SYNC_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record an upstream catalog request
pub fn record_catalog_request(endpoint: &str, outcome: &str) {
    CATALOG_REQUESTS_TOTAL
        .with_label_values(&[endpoint, outcome])
        .inc();
}

/// Update the cached playlist count
pub fn set_playlists_cached(count: usize) {
    PLAYLISTS_CACHED.set(count as f64);
}

/// Record an error
pub fn record_error(error_type: &str, endpoint: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, endpoint])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
