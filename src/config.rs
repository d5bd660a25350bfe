//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

/// Application configuration loaded from environment variables.
///
/// The `DB_*` connection variables are injected by Kubernetes ConfigMaps and
/// Secrets and have no defaults.
#[derive(Clone, Deserialize)]
pub struct Config {
    // === Database Connection ===
    /// Database hostname (usually the Kubernetes Service name).
    pub db_host: String,

    /// Database port.
    pub db_port: u16,

    /// Database name.
    pub db_name: String,

    /// Database user.
    pub db_user: String,

    /// Database password.
    pub db_password: String,

    // === Pool Bounds ===
    /// Connections kept open even when idle.
    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    /// Upper bound on concurrently open connections.
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    /// Seconds a request may wait for a free pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub db_acquire_timeout_secs: u64,

    /// Seconds the health check may spend before answering 503.
    #[serde(default = "default_health_timeout")]
    pub db_health_timeout_secs: u64,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_health_timeout() -> u64 {
    1
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.db_host.trim().is_empty() {
            return Err("DB_HOST must not be empty".to_string());
        }

        if self.db_name.trim().is_empty() {
            return Err("DB_NAME must not be empty".to_string());
        }

        if self.db_user.trim().is_empty() {
            return Err("DB_USER must not be empty".to_string());
        }

        if self.db_max_connections == 0 {
            return Err("DB_MAX_CONNECTIONS must be at least 1".to_string());
        }

        if self.db_health_timeout_secs == 0 {
            return Err("DB_HEALTH_TIMEOUT_SECS must be at least 1".to_string());
        }

        if self.db_min_connections > self.db_max_connections {
            return Err(format!(
                "DB_MIN_CONNECTIONS ({}) must not exceed DB_MAX_CONNECTIONS ({})",
                self.db_min_connections, self.db_max_connections
            ));
        }

        Ok(())
    }

    /// Connection options for the PostgreSQL driver.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .database(&self.db_name)
            .username(&self.db_user)
            .password(&self.db_password)
    }

    /// How long a request waits on a saturated pool.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db_acquire_timeout_secs)
    }

    /// Upper bound on how long a health check takes.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.db_health_timeout_secs)
    }

    /// Connection target with the password left out, for logs.
    pub fn database_target(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.db_user, self.db_host, self.db_port, self.db_name
        )
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"********")
            .field("db_min_connections", &self.db_min_connections)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("db_health_timeout_secs", &self.db_health_timeout_secs)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            db_host: "postgres-service".to_string(),
            db_port: 5432,
            db_name: "webstack".to_string(),
            db_user: "webstack".to_string(),
            db_password: "hunter2".to_string(),
            db_min_connections: default_min_connections(),
            db_max_connections: default_max_connections(),
            db_acquire_timeout_secs: default_acquire_timeout(),
            db_health_timeout_secs: default_health_timeout(),
            port: default_port(),
            rust_log: default_log_level(),
            log_format: LogFormat::default(),
        }
    }

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_min_connections(), 1);
        assert_eq!(default_max_connections(), 10);
        assert_eq!(default_health_timeout(), 1);
        assert_eq!(default_port(), 8000);
        assert_eq!(default_log_level(), "info");
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn loads_from_variable_pairs() {
        let vars = vec![
            ("DB_HOST".to_string(), "db".to_string()),
            ("DB_PORT".to_string(), "5433".to_string()),
            ("DB_NAME".to_string(), "app".to_string()),
            ("DB_USER".to_string(), "app".to_string()),
            ("DB_PASSWORD".to_string(), "secret".to_string()),
            ("LOG_FORMAT".to_string(), "json".to_string()),
        ];

        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.db_port, 5433);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.port, 8000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_database_variable_is_an_error() {
        let vars = vec![
            ("DB_HOST".to_string(), "db".to_string()),
            ("DB_PORT".to_string(), "5432".to_string()),
            ("DB_NAME".to_string(), "app".to_string()),
            ("DB_USER".to_string(), "app".to_string()),
        ];

        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        let vars = vec![
            ("DB_HOST".to_string(), "db".to_string()),
            ("DB_PORT".to_string(), "five".to_string()),
            ("DB_NAME".to_string(), "app".to_string()),
            ("DB_USER".to_string(), "app".to_string()),
            ("DB_PASSWORD".to_string(), "secret".to_string()),
        ];

        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }

    #[test]
    fn validate_rejects_empty_host() {
        let mut config = base_config();
        config.db_host = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_pool_bounds() {
        let mut config = base_config();
        config.db_min_connections = 11;
        assert!(config.validate().is_err());

        config.db_min_connections = 0;
        config.db_max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_health_timeout() {
        let mut config = base_config();
        config.db_health_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_masks_password() {
        let rendered = format!("{:?}", base_config());
        assert!(!rendered.contains("hunter2"));
        assert!(!base_config().database_target().contains("hunter2"));
    }
}
