//! Unified error types for the webstack API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Unified error type for the webstack API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested record does not exist.
    #[error("{0}")]
    NotFound(&'static str),

    /// Health check failed.
    #[error("Unhealthy: {0}")]
    Unhealthy(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status this error maps to when it reaches a handler boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Config(_)
            | ApiError::InvalidConfig(_)
            | ApiError::Database(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable failure description.
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            ApiError::NotFound(_) | ApiError::Unhealthy(_) => self.to_string(),
            _ => {
                error!(error = %self, "request failed");
                "Internal Server Error".to_string()
            }
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ApiError>;
