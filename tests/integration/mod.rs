//! Integration tests against a real PostgreSQL.
//!
//! These tests require the DB_HOST, DB_PORT, DB_NAME, DB_USER and DB_PASSWORD
//! environment variables to point at a disposable database.
//! Run with: cargo test --test integration -- --ignored --test-threads=1
//!
//! Note: These tests drop and recreate the `settings` table.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use webstack_api::api::{create_router, AppState};
use webstack_api::config::Config;
use webstack_api::db::{Database, PoolState, DEFAULT_NAME};
use webstack_api::metrics::detached_handle;

/// Get a test config from environment.
fn test_config() -> Option<Config> {
    dotenvy::dotenv().ok();
    let config = Config::load().ok()?;
    config.validate().ok()?;
    Some(config)
}

async fn reset_table(config: &Config) {
    let db = Database::connect(config).await.expect("connect");
    sqlx::query("DROP TABLE IF EXISTS settings")
        .execute(db.pool())
        .await
        .expect("drop settings");
    db.close().await;
}

async fn row_count(db: &Database) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(db.pool())
        .await
        .expect("count rows")
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Fresh database: startup creates the table and the default row.
#[tokio::test]
#[ignore = "requires DB_* pointing at PostgreSQL"]
async fn test_fresh_database_serves_default_name() {
    let Some(config) = test_config() else {
        println!("Skipping: DB_* not set");
        return;
    };
    reset_table(&config).await;

    let db = Database::connect(&config).await.expect("connect");
    assert_eq!(db.state(), PoolState::Ready);

    let app = create_router(AppState::with_instance_id(
        db.clone(),
        detached_handle().unwrap(),
        "it-pod",
    ));

    let (status, body) = get_json(&app, "/api/user").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": DEFAULT_NAME }));

    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy", "database": "connected" }));

    db.close().await;
    assert_eq!(db.state(), PoolState::Closed);
}

/// Initializing twice inserts nothing the second time.
#[tokio::test]
#[ignore = "requires DB_* pointing at PostgreSQL"]
async fn test_initialize_is_idempotent() {
    let Some(config) = test_config() else {
        println!("Skipping: DB_* not set");
        return;
    };
    reset_table(&config).await;

    let db = Database::connect(&config).await.expect("connect");
    assert_eq!(row_count(&db).await, 1);

    assert!(!db.initialize().await.expect("second initialize"));
    assert_eq!(row_count(&db).await, 1);

    let again = Database::connect(&config).await.expect("reconnect");
    assert_eq!(row_count(&again).await, 1);

    again.close().await;
    db.close().await;
}

/// An existing name is served as-is.
#[tokio::test]
#[ignore = "requires DB_* pointing at PostgreSQL"]
async fn test_existing_row_is_not_overwritten() {
    let Some(config) = test_config() else {
        println!("Skipping: DB_* not set");
        return;
    };
    reset_table(&config).await;

    let db = Database::connect(&config).await.expect("connect");
    sqlx::query("UPDATE settings SET name = $1")
        .bind("Ada")
        .execute(db.pool())
        .await
        .expect("update name");
    db.close().await;

    let db = Database::connect(&config).await.expect("reconnect");
    let setting = db.fetch_setting().await.expect("fetch").expect("row");
    assert_eq!(setting.name, "Ada");
    assert_eq!(row_count(&db).await, 1);
    db.close().await;
}

/// Empty table after startup surfaces as 404.
#[tokio::test]
#[ignore = "requires DB_* pointing at PostgreSQL"]
async fn test_empty_table_returns_404() {
    let Some(config) = test_config() else {
        println!("Skipping: DB_* not set");
        return;
    };
    reset_table(&config).await;

    let db = Database::connect(&config).await.expect("connect");
    sqlx::query("DELETE FROM settings")
        .execute(db.pool())
        .await
        .expect("delete rows");

    let app = create_router(AppState::with_instance_id(
        db.clone(),
        detached_handle().unwrap(),
        "it-pod",
    ));
    let (status, body) = get_json(&app, "/api/user").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "No user found" }));

    db.close().await;
}

/// More concurrent holders than the pool bound queue instead of failing.
#[tokio::test]
#[ignore = "requires DB_* pointing at PostgreSQL"]
async fn test_pool_saturation_queues_requests() {
    let Some(config) = test_config() else {
        println!("Skipping: DB_* not set");
        return;
    };

    let db = Database::connect(&config).await.expect("connect");
    let holders = config.db_max_connections as usize + 5;

    let tasks: Vec<_> = (0..holders)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move {
                sqlx::query("SELECT pg_sleep(0.2)")
                    .execute(db.pool())
                    .await
                    .map(|_| ())
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("join").expect("query under saturation");
    }

    assert!(db.pool().size() <= config.db_max_connections);
    db.close().await;
}

/// Closing the pool turns health into 503.
#[tokio::test]
#[ignore = "requires DB_* pointing at PostgreSQL"]
async fn test_health_after_close_is_unavailable() {
    let Some(config) = test_config() else {
        println!("Skipping: DB_* not set");
        return;
    };

    let db = Database::connect(&config).await.expect("connect");
    let app = create_router(AppState::with_instance_id(
        db.clone(),
        detached_handle().unwrap(),
        "it-pod",
    ));

    let (status, _) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    db.close().await;

    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().starts_with("Unhealthy: "));
}
