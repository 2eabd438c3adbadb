//! Database configuration
//!
//! All options can come from the environment (the deployment convention for
//! this backend) or be set programmatically with the builder methods.

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pool::PoolOptions;

/// Recognized environment variables.
const ENV_USER: &str = "DB_USER";
const ENV_PASSWORD: &str = "DB_PASSWORD";
const ENV_DSN: &str = "DB_DSN";
const ENV_MIN_POOL: &str = "DB_MIN_POOL";
const ENV_MAX_POOL: &str = "DB_MAX_POOL";
const ENV_INCREMENT: &str = "DB_POOL_INCREMENT";
const ENV_POOL_TIMEOUT: &str = "DB_POOL_TIMEOUT";
const ENV_MAX_LIFETIME: &str = "DB_MAX_LIFETIME";
const ENV_MOCK_MODE: &str = "DB_MOCK_MODE";

/// Connection and pool configuration for the data-access layer.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database account name.
    pub user: String,
    /// Database account password.
    pub password: String,
    /// Data source name, `host:port/database` (port and database optional).
    pub dsn: String,
    /// Minimum pool size.
    pub min_pool: usize,
    /// Maximum pool size.
    pub max_pool: usize,
    /// Pool replenish batch size.
    pub increment: usize,
    /// Seconds to wait for a free connection.
    pub pool_timeout: u64,
    /// Seconds a connection may live before retirement.
    pub max_lifetime_session: u64,
    /// Route the facade to the in-memory fixture backend instead of a live
    /// pool.
    pub mock_mode: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            dsn: "localhost:3306/releasedb".to_string(),
            min_pool: 2,
            max_pool: 10,
            increment: 1,
            pool_timeout: 30,
            max_lifetime_session: 3600,
            mock_mode: false,
        }
    }
}

impl DbConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset. Malformed numeric values are an error rather
    /// than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(user) = env::var(ENV_USER) {
            config.user = user;
        }
        if let Ok(password) = env::var(ENV_PASSWORD) {
            config.password = password;
        }
        if let Ok(dsn) = env::var(ENV_DSN) {
            config.dsn = dsn;
        }
        config.min_pool = read_usize(ENV_MIN_POOL)?.unwrap_or(config.min_pool);
        config.max_pool = read_usize(ENV_MAX_POOL)?.unwrap_or(config.max_pool);
        config.increment = read_usize(ENV_INCREMENT)?.unwrap_or(config.increment);
        config.pool_timeout = read_u64(ENV_POOL_TIMEOUT)?.unwrap_or(config.pool_timeout);
        config.max_lifetime_session =
            read_u64(ENV_MAX_LIFETIME)?.unwrap_or(config.max_lifetime_session);
        if let Ok(flag) = env::var(ENV_MOCK_MODE) {
            config.mock_mode = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(config)
    }

    /// Set the database account.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the account password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the data source name (`host:port/database`).
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = dsn.into();
        self
    }

    /// Set minimum and maximum pool sizes.
    pub fn pool_sizes(mut self, min: usize, max: usize) -> Self {
        self.min_pool = min;
        self.max_pool = max;
        self
    }

    /// Set the acquire timeout in seconds.
    pub fn pool_timeout(mut self, seconds: u64) -> Self {
        self.pool_timeout = seconds;
        self
    }

    /// Route to the fixture backend.
    pub fn mock_mode(mut self, mock: bool) -> Self {
        self.mock_mode = mock;
        self
    }

    /// Pool options derived from this configuration.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions::default()
            .min_size(self.min_pool)
            .max_size(self.max_pool)
            .increment(self.increment)
            .acquire_timeout(Duration::from_secs(self.pool_timeout))
            .max_lifetime(Duration::from_secs(self.max_lifetime_session))
    }

    /// Split the DSN into `(host, port, database)`.
    pub(crate) fn dsn_parts(&self) -> Result<(String, u16, Option<String>)> {
        let (addr, database) = match self.dsn.split_once('/') {
            Some((addr, db)) if !db.is_empty() => (addr, Some(db.to_string())),
            Some((addr, _)) => (addr, None),
            None => (self.dsn.as_str(), None),
        };
        let (host, port) = match addr.split_once(':') {
            Some((host, port)) => {
                let port: u16 = port.parse().map_err(|_| {
                    Error::Config(format!("invalid port in DSN '{}'", self.dsn))
                })?;
                (host, port)
            }
            None => (addr, 3306),
        };
        if host.is_empty() {
            return Err(Error::Config(format!("missing host in DSN '{}'", self.dsn)));
        }
        Ok((host.to_string(), port, database))
    }
}

fn read_usize(key: &str) -> Result<Option<usize>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}

fn read_u64(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
