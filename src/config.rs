//! Process configuration read from the environment.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::pool::DEFAULT_MAX_CONNECTIONS;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// SQLite database file. Parent directories are created on startup.
    pub database_path: PathBuf,
    pub database_max_connections: u32,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            database_path: PathBuf::from("./data/reviewers.db"),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            log_level: "info".to_string(),
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let http_port = match get("HTTP_PORT") {
            Some(v) => v.trim().parse::<u16>().context("HTTP_PORT must be a valid port")?,
            None => defaults.http_port,
        };

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            None => defaults.database_max_connections,
        };

        let log_level = get("LOG_LEVEL").unwrap_or(defaults.log_level);

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse::<u64>()
                    .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            ),
            None => defaults.request_timeout,
        };

        let shutdown_timeout = match get("SHUTDOWN_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse::<u64>()
                    .context("SHUTDOWN_TIMEOUT_SECS must be a number of seconds")?,
            ),
            None => defaults.shutdown_timeout,
        };

        Ok(Config {
            http_port,
            database_path,
            database_max_connections,
            log_level,
            request_timeout,
            shutdown_timeout,
        })
    }
}
