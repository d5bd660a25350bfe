//! Webstack API entry point.

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use webstack_api::api::{create_router, AppState};
use webstack_api::config::{Config, LogFormat};
use webstack_api::db::Database;
use webstack_api::error::ApiError;
use webstack_api::metrics;
use webstack_api::utils::shutdown_signal;

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Backend API for the Kubernetes webstack demo.
#[derive(Parser, Debug)]
#[command(name = "webstack-api")]
#[command(about = "User, instance id and health endpoints backed by PostgreSQL")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// HTTP server port (overrides PORT).
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Initialize the database and serve HTTP until shutdown (default).
    Serve,

    /// Check configuration validity.
    CheckConfig,

    /// Create the schema and default row, then exit.
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::CheckConfig => cmd_check_config(args.port),
        Command::InitDb => {
            let config = load_config(args.port)?;
            init_tracing(&config, args.verbose);
            cmd_init_db(&config).await
        }
        Command::Serve => {
            let config = load_config(args.port)?;
            init_tracing(&config, args.verbose);
            cmd_serve(config).await
        }
    }
}

fn load_config(port_override: Option<u16>) -> Result<Config, ApiError> {
    let mut config = Config::load()?;
    if let Some(port) = port_override {
        config.port = port;
    }
    config.validate().map_err(ApiError::InvalidConfig)?;
    Ok(config)
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("webstack_api=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.rust_log))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

/// Validate configuration and print a summary.
fn cmd_check_config(port_override: Option<u16>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("WEBSTACK API - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    std::io::stdout().flush().ok();
    let config = match load_config(port_override) {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration check failed"));
        }
    };

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Database: {}", config.database_target());
    println!("  Password: {}", if config.db_password.is_empty() { "(empty)" } else { "********" });
    println!(
        "  Pool Bounds: {}..={} connections",
        config.db_min_connections, config.db_max_connections
    );
    println!("  Acquire Timeout: {}s", config.db_acquire_timeout_secs);
    println!("  Health Timeout: {}s", config.db_health_timeout_secs);
    println!("  HTTP Port: {}", config.port);
    println!("  Log Level: {}", config.rust_log);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Bring the schema up to date and exit.
async fn cmd_init_db(config: &Config) -> anyhow::Result<()> {
    info!(database = %config.database_target(), "initializing database");
    let db = Database::connect(config)
        .await
        .context("database initialization failed")?;
    db.close().await;
    info!("database initialized");
    Ok(())
}

fn spawn_metrics_upkeep(handle: PrometheusHandle) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            handle.run_upkeep();
        }
    });
}

/// Serve HTTP until a shutdown signal arrives.
async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let handle = metrics::install_recorder().context("failed to install metrics recorder")?;
    metrics::init_metrics();
    spawn_metrics_upkeep(handle.clone());

    info!(database = %config.database_target(), "connecting to database");
    let db = Database::connect(&config).await.map_err(|e| {
        error!(error = %e, "database initialization failed");
        e
    })?;

    let app_state = AppState::new(db.clone(), handle);
    info!(instance_id = %app_state.instance_id, "instance ready");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            db.close().await;
            return Err(e).with_context(|| format!("failed to bind {}", addr));
        }
    };
    info!("HTTP server listening on {}", addr);

    let served = axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    db.close().await;
    served.context("HTTP server error")?;

    info!("shutdown complete");
    Ok(())
}
