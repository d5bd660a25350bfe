//! Prometheus metrics for request monitoring.
//!
//! This module provides:
//! - Per-route HTTP request counts and latency histograms
//! - Database query outcome counters
//! - The recorder whose handle renders the scrape endpoint

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use tracing::debug;

// === Metric Name Constants ===

/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// HTTP request duration metric name.
pub const METRIC_HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
/// Database queries counter metric name.
pub const METRIC_DB_QUERIES: &str = "db_queries_total";

/// Handler label for requests that matched no route.
const UNMATCHED_HANDLER: &str = "none";

const HTTP_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Initialize all metric descriptions.
/// Call this once at startup, after the recorder is installed.
pub fn init_metrics() {
    describe_counter!(
        METRIC_HTTP_REQUESTS,
        "Total number of HTTP requests by method, handler and status"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_DURATION,
        metrics::Unit::Seconds,
        "HTTP request latency by method and handler"
    );
    describe_counter!(
        METRIC_DB_QUERIES,
        "Total number of database queries by query and outcome"
    );

    debug!("Metrics initialized");
}

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(METRIC_HTTP_REQUEST_DURATION.to_string()),
        HTTP_DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder as the global metrics recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Build a recorder with the service's buckets without installing it.
pub fn build_recorder() -> Result<PrometheusRecorder, BuildError> {
    Ok(builder()?.build_recorder())
}

/// Build a recorder without installing it globally and return its handle.
///
/// Metrics emitted through the global macros will not show up in this
/// handle's output.
pub fn detached_handle() -> Result<PrometheusHandle, BuildError> {
    Ok(build_recorder()?.handle())
}

/// Record one completed HTTP request.
pub fn record_http_request(method: &str, handler: &str, status: u16, elapsed: Duration) {
    counter!(
        METRIC_HTTP_REQUESTS,
        "method" => method.to_string(),
        "handler" => handler.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        METRIC_HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "handler" => handler.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Record one database query and whether it succeeded.
pub fn record_db_query(query: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(METRIC_DB_QUERIES, "query" => query, "outcome" => outcome).increment(1);
}

/// Middleware recording request count and latency per route template.
pub async fn track_http(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_HANDLER.to_owned());
    let method = request.method().clone();

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &handler,
        response.status().as_u16(),
        start.elapsed(),
    );
    response
}
