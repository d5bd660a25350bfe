//! Database module: connection pool lifecycle and the settings store.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL for initializing and querying the database
//! - `postgres.rs`: pooled PostgreSQL access and lifecycle tracking

pub mod models;
pub mod postgres;
pub mod schema;

pub use models::Setting;
pub use postgres::{Database, PoolState};
pub use schema::DEFAULT_NAME;
