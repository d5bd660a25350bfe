use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::models::Setting;
use crate::db::schema;
use crate::error::{ApiError, Result};
use crate::metrics;

/// Health check budget for pools not built from a `Config`.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Closing = 3,
    Closed = 4,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PoolState::Initializing,
            2 => PoolState::Ready,
            3 => PoolState::Closing,
            4 => PoolState::Closed,
            _ => PoolState::Uninitialized,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolState::Uninitialized => "uninitialized",
            PoolState::Initializing => "initializing",
            PoolState::Ready => "ready",
            PoolState::Closing => "closing",
            PoolState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn get(&self) -> PoolState {
        PoolState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn advance(&self, next: PoolState) {
        let prev = PoolState::from_u8(self.0.swap(next as u8, Ordering::SeqCst));
        debug!(from = %prev, to = %next, "pool state transition");
    }
}

/// Pooled PostgreSQL access for the settings table.
///
/// Cloning is cheap; clones share the same pool and lifecycle.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    lifecycle: Arc<Lifecycle>,
    health_timeout: Duration,
}

impl Database {
    /// Open the pool and bring the schema up to date.
    ///
    /// Returns only once the pool is `Ready`: the settings table exists and
    /// holds at least one row. Any failure closes the pool and is returned.
    pub async fn connect(config: &Config) -> Result<Self> {
        let lifecycle = Arc::new(Lifecycle::default());
        lifecycle.advance(PoolState::Initializing);

        let pool = PgPoolOptions::new()
            .min_connections(config.db_min_connections)
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(config.connect_options())
            .await?;

        info!(
            database = %config.database_target(),
            min_connections = config.db_min_connections,
            max_connections = config.db_max_connections,
            "database connection pool created"
        );

        let db = Self {
            pool,
            lifecycle,
            health_timeout: config.health_timeout(),
        };
        match db.initialize().await {
            Ok(inserted) => {
                if inserted {
                    info!(name = schema::DEFAULT_NAME, "inserted default settings row");
                }
            }
            Err(e) => {
                db.close().await;
                return Err(e);
            }
        }

        db.lifecycle.advance(PoolState::Ready);
        Ok(db)
    }

    /// Wrap an already-configured pool without running initialization.
    pub fn from_pool(pool: PgPool) -> Self {
        let lifecycle = Arc::new(Lifecycle::default());
        lifecycle.advance(PoolState::Ready);
        Self {
            pool,
            lifecycle,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    /// Bound how long `ping` may take.
    pub fn with_health_timeout(mut self, health_timeout: Duration) -> Self {
        self.health_timeout = health_timeout;
        self
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.lifecycle.get()
    }

    /// Create the settings table if absent and insert the default row if the
    /// table is empty. Idempotent. Returns whether a row was inserted.
    pub async fn initialize(&self) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(schema::INIT_LOCK)
            .bind(schema::INIT_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        sqlx::query(schema::CREATE_SETTINGS)
            .execute(&mut *tx)
            .await?;

        let count: i64 = sqlx::query_scalar(schema::COUNT_SETTINGS)
            .fetch_one(&mut *tx)
            .await?;

        let inserted = count == 0;
        if inserted {
            sqlx::query(schema::INSERT_SETTING)
                .bind(schema::DEFAULT_NAME)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Fetch the settings row, if any.
    pub async fn fetch_setting(&self) -> Result<Option<Setting>> {
        let result = sqlx::query_as::<_, Setting>(schema::SELECT_SETTING)
            .fetch_optional(&self.pool)
            .await;
        metrics::record_db_query("select_setting", result.is_ok());
        Ok(result?)
    }

    /// Round-trip a trivial query, answering within the health timeout.
    ///
    /// The pooled query gets half the budget. If no pooled connection turns
    /// up in time, one direct connection is attempted with the rest so the
    /// error names the driver's cause (refused, auth, DNS) rather than an
    /// acquire timeout.
    pub async fn ping(&self) -> Result<()> {
        let result = self.check_health().await;
        metrics::record_db_query("ping", result.is_ok());
        if let Err(e) = &result {
            warn!(error = %e, "database ping failed");
        }
        result
    }

    async fn check_health(&self) -> Result<()> {
        let pooled_budget = self.health_timeout / 2;
        match timeout(pooled_budget, sqlx::query(schema::PING).execute(&self.pool)).await {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(sqlx::Error::PoolTimedOut)) | Err(_) => {
                debug!("no pooled connection for health check, connecting directly");
            }
            Ok(Err(e)) => return Err(e.into()),
        }

        let direct_budget = self.health_timeout.saturating_sub(pooled_budget);
        match timeout(direct_budget, self.ping_direct()).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Unhealthy(format!(
                "database did not answer within {}ms",
                self.health_timeout.as_millis()
            ))),
        }
    }

    async fn ping_direct(&self) -> Result<()> {
        let options = self.pool.connect_options();
        let mut conn = PgConnection::connect_with(&options).await?;
        sqlx::query(schema::PING).execute(&mut conn).await?;
        conn.close().await.ok();
        Ok(())
    }

    /// Release every pooled connection. Later queries fail with a
    /// pool-closed error.
    pub async fn close(&self) {
        if matches!(self.state(), PoolState::Closing | PoolState::Closed) {
            return;
        }
        self.lifecycle.advance(PoolState::Closing);
        self.pool.close().await;
        self.lifecycle.advance(PoolState::Closed);
        info!("database connection pool closed");
    }
}
