//! Configuration for the store client and the surrounding application.
//!
//! [`StoreConfig`] is everything the client needs to reach the store.
//! [`AppConfig`] is the full environment-derived configuration; it is built
//! once by the caller and passed down explicitly.

use std::time::Duration;

use crate::util::constants::{
    DEFAULT_DATABASE, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
use crate::util::error::{Result, SiemError};

/// Connection and retry settings for one store.
///
/// Worst-case latency of a single call is roughly
/// `retry_attempts * (timeout + retry_delay)` per exchange attempt, because
/// the timeout bounds each attempt rather than the whole call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Store host name or IP address.
    pub host: String,
    /// Store TCP port.
    pub port: u16,
    /// Database name sent in every request envelope.
    pub database: String,
    /// Applied to the connect attempt and all I/O on the socket.
    pub timeout: Duration,
    /// Attempts for connecting and for exchanging a request. Minimum 1.
    pub retry_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl StoreConfig {
    /// Configuration with the default database, timeout and retry policy.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            database: DEFAULT_DATABASE.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attempt count (clamped to at least 1) and the fixed delay.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// `host:port`, as used in log lines and connection errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full application configuration read from `SIEM_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub web_host: String,
    pub web_port: u16,
    pub admin_user: String,
    pub admin_password: String,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup. Missing keys take their defaults;
    /// `SIEM_ADMIN_PASSWORD` is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let config = Self {
            db_host: get("SIEM_DB_HOST", "127.0.0.1"),
            db_port: parse_port("SIEM_DB_PORT", &get("SIEM_DB_PORT", "8080"))?,
            db_name: get("SIEM_DB_NAME", DEFAULT_DATABASE),
            web_host: get("SIEM_WEB_HOST", "0.0.0.0"),
            web_port: parse_port("SIEM_WEB_PORT", &get("SIEM_WEB_PORT", "8000"))?,
            admin_user: get("SIEM_ADMIN_USER", "admin"),
            admin_password: get("SIEM_ADMIN_PASSWORD", ""),
        };

        if config.admin_password.is_empty() {
            return Err(SiemError::Config(
                "SIEM_ADMIN_PASSWORD environment variable is required".into(),
            ));
        }

        Ok(config)
    }

    /// Store client settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.db_host.clone(), self.db_port).with_database(self.db_name.clone())
    }
}

fn parse_port(key: &str, raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(SiemError::Config(format!("Invalid port in {key}: 0"))),
        Ok(port) => Ok(port),
        Err(_) => Err(SiemError::Config(format!(
            "{key} must be a valid port number, got {raw:?}"
        ))),
    }
}
