//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::db::Database;
use crate::error::{ApiError, ErrorResponse, Result};

/// Content type of the Prometheus text exposition format.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Pooled database access.
    pub db: Database,
    /// Name of this instance, stable for the process lifetime.
    pub instance_id: Arc<str>,
    /// Renders the metrics scrape output.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Create new app state, resolving the instance id from the host.
    pub fn new(db: Database, metrics: PrometheusHandle) -> Self {
        Self::with_instance_id(db, metrics, resolve_instance_id())
    }

    /// Create app state with an explicit instance id.
    pub fn with_instance_id(
        db: Database,
        metrics: PrometheusHandle,
        instance_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            db,
            instance_id: instance_id.into(),
            metrics,
        }
    }
}

/// Resolve the network hostname of this process.
///
/// In Kubernetes this is the pod name. Falls back to `$HOSTNAME`, then
/// `"unknown"`.
pub fn resolve_instance_id() -> String {
    let from_os = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok());

    pick_instance_id(from_os, std::env::var("HOSTNAME").ok())
}

fn pick_instance_id(from_os: Option<String>, from_env: Option<String>) -> String {
    from_os
        .filter(|name| !name.is_empty())
        .or_else(|| from_env.filter(|name| !name.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// User endpoint response.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    /// Display name stored in the settings table.
    pub name: String,
}

/// Instance id endpoint response.
#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceResponse {
    /// Hostname of the instance that served the request.
    pub id: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status: "healthy".
    pub status: &'static str,
    /// Database status: "connected".
    pub database: &'static str,
}

/// Returns the user name stored in the database.
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "webstack",
    responses(
        (status = 200, description = "Current user name", body = UserResponse),
        (status = 404, description = "Settings table is empty", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse)
    )
)]
pub async fn get_user(State(state): State<AppState>) -> Result<Json<UserResponse>> {
    let setting = state
        .db
        .fetch_setting()
        .await?
        .ok_or(ApiError::NotFound("No user found"))?;

    debug!(id = setting.id, "served settings row");
    Ok(Json(UserResponse { name: setting.name }))
}

/// Returns the hostname of the serving instance.
///
/// With several replicas behind a Service, successive calls may land on
/// different pods.
#[utoipa::path(
    get,
    path = "/api/id",
    tag = "webstack",
    responses((status = 200, description = "Serving instance hostname", body = InstanceResponse))
)]
pub async fn get_instance_id(State(state): State<AppState>) -> Json<InstanceResponse> {
    Json(InstanceResponse {
        id: state.instance_id.to_string(),
    })
}

/// Health check handler - 200 while the database answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "webstack",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = ErrorResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    if let Err(e) = state.db.ping().await {
        let reason = match e {
            ApiError::Database(inner) => inner.to_string(),
            ApiError::Unhealthy(reason) => reason,
            other => other.to_string(),
        };
        return Err(ApiError::Unhealthy(reason));
    }

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
    }))
}

/// Prometheus scrape endpoint.
pub async fn scrape_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            detail: "Not Found".to_string(),
        }),
    )
}
