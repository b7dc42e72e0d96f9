use crate::application::ManagerConfig;
use crate::domain::services::BackoffPolicy;
use crate::domain::value_objects::{DatastoreSettings, DatastoreUrl};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Config {
    // Datastore settings
    pub database_url: String,
    pub connection_limit: u32,
    pub pool_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub socket_timeout_secs: u64,
    pub ssl_required: bool,

    // Lifecycle settings
    pub health_check_interval_secs: u64,
    pub shutdown_drain_secs: u64,

    // Health API settings
    pub listen_addr: String,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost:5432/storefront".to_string(),
            connection_limit: 10,
            pool_timeout_secs: 20,
            connect_timeout_secs: 10,
            socket_timeout_secs: 30,
            ssl_required: false,
            health_check_interval_secs: 30,
            shutdown_drain_secs: 10,
            listen_addr: "0.0.0.0:4000".to_string(),
            debug: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print credentials
        let database_url = DatastoreUrl::parse(&self.database_url)
            .map(|url| url.redacted())
            .unwrap_or_else(|_| "<invalid>".to_string());

        f.debug_struct("Config")
            .field("database_url", &database_url)
            .field("connection_limit", &self.connection_limit)
            .field("pool_timeout_secs", &self.pool_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("socket_timeout_secs", &self.socket_timeout_secs)
            .field("ssl_required", &self.ssl_required)
            .field("health_check_interval_secs", &self.health_check_interval_secs)
            .field("shutdown_drain_secs", &self.shutdown_drain_secs)
            .field("listen_addr", &self.listen_addr)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid DATABASE_URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("connection limit must be at least 1")]
    ZeroConnectionLimit,
    #[error("health check interval must be at least 1 second")]
    ZeroHealthCheckInterval,
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        DatastoreUrl::parse(&self.database_url)
            .map_err(|e| ConfigError::InvalidDatabaseUrl(e.to_string()))?;
        if self.connection_limit == 0 {
            return Err(ConfigError::ZeroConnectionLimit);
        }
        if self.health_check_interval_secs == 0 {
            return Err(ConfigError::ZeroHealthCheckInterval);
        }
        Ok(())
    }

    /// Pooled-client parameters.
    pub fn datastore_settings(&self) -> Result<DatastoreSettings, ConfigError> {
        let url = DatastoreUrl::parse(&self.database_url)
            .map_err(|e| ConfigError::InvalidDatabaseUrl(e.to_string()))?;

        Ok(DatastoreSettings {
            url,
            max_connections: self.connection_limit,
            pool_timeout: Duration::from_secs(self.pool_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            socket_timeout: Duration::from_secs(self.socket_timeout_secs),
            tls_required: self.ssl_required,
        })
    }

    /// Connection manager parameters.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            backoff: BackoffPolicy::default(),
            health_check_interval: Duration::from_secs(self.health_check_interval_secs),
            drain_timeout: Duration::from_secs(self.shutdown_drain_secs),
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_config_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let number = |key: &str, default: u64| -> u64 {
        var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
    };

    let flag = |key: &str| -> bool {
        var(key)
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false)
    };

    let database_url = var("DATABASE_URL").unwrap_or(defaults.database_url);

    let connection_limit = var("DB_CONNECTION_LIMIT")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.connection_limit);

    let pool_timeout_secs = number("DB_POOL_TIMEOUT_SECS", defaults.pool_timeout_secs);
    let connect_timeout_secs = number("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs);
    let socket_timeout_secs = number("DB_SOCKET_TIMEOUT_SECS", defaults.socket_timeout_secs);
    let ssl_required = flag("DB_SSL_REQUIRED");

    let health_check_interval_secs = number(
        "DB_HEALTH_CHECK_INTERVAL_SECS",
        defaults.health_check_interval_secs,
    );
    let shutdown_drain_secs = number("DB_SHUTDOWN_DRAIN_SECS", defaults.shutdown_drain_secs);

    let listen_addr = var("STOREFRONT_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

    let debug = var("DEBUG").is_some();

    let config = Config {
        database_url,
        connection_limit,
        pool_timeout_secs,
        connect_timeout_secs,
        socket_timeout_secs,
        ssl_required,
        health_check_interval_secs,
        shutdown_drain_secs,
        listen_addr,
        debug,
    };
    config.validate()?;
    Ok(config)
}
