//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use order_store::DEFAULT_REQUEST_TIMEOUT;

/// Which key-value backend the server stores orders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Redis,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `STORAGE_BACKEND`: `redis` or `memory` (default: `redis`)
/// - `REDIS_ADDR`: server address, with or without the `redis://` scheme
/// - `ORDER_INDEX_SET`: name of the index set (default: `"orders"`)
/// - `REQUEST_TIMEOUT_MS`: deadline per storage call, must be positive (default: `5000`)
/// - `PAGE_SIZE`: orders per listing page (default: `50`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub storage: StorageBackend,
    pub redis_url: String,
    pub index_set: String,
    pub request_timeout: Duration,
    pub page_size: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            storage: lookup("STORAGE_BACKEND")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.storage),
            redis_url: lookup("REDIS_ADDR")
                .map(|addr| redis_url(&addr))
                .unwrap_or(defaults.redis_url),
            index_set: lookup("ORDER_INDEX_SET")
                .filter(|name| !name.is_empty())
                .unwrap_or(defaults.index_set),
            request_timeout: lookup("REQUEST_TIMEOUT_MS")
                .and_then(|ms| ms.parse::<u64>().ok())
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            page_size: lookup("PAGE_SIZE")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.page_size),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            storage: StorageBackend::default(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            index_set: "orders".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_size: 50,
        }
    }
}

/// Turns a bare `host:port` into a connection URL.
fn redis_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{addr}")
    }
}
