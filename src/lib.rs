//! Backend API for the Kubernetes webstack demo.
//!
//! A small HTTP service meant to be deployed as several replicas behind a
//! Service:
//!
//! ```text
//! GET /api/user    -> {"name": "Student"}      read from PostgreSQL
//! GET /api/id      -> {"id": "backend-7d9f"}   pod hostname
//! GET /api/health  -> {"status": "healthy", "database": "connected"}
//! GET /metrics     -> Prometheus exposition
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`db`]: Connection pool lifecycle and the settings store
//! - [`api`]: HTTP routes, handlers and OpenAPI document
//! - [`metrics`]: Prometheus recorder and request instrumentation
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, Result};
