// ABOUTME: Configuration loading and validation for the podshelf server.
// ABOUTME: Reads PODSHELF_* environment variables and derives the storage configuration from them.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use podshelf_store::StoreConfig;
use thiserror::Error;

use crate::fetch::DEFAULT_FETCH_TIMEOUT;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PODSHELF_PORT is not a valid TCP port: {0}")]
    InvalidPort(String),

    #[error("PODSHELF_HOST is not a valid IP address: {0}")]
    InvalidHost(String),

    #[error("write timeout must be a positive number of milliseconds: {0}")]
    InvalidWriteTimeout(String),

    #[error("PODSHELF_FETCH_TIMEOUT_SECS must be a positive number of seconds: {0}")]
    InvalidFetchTimeout(String),

    #[error("PODSHELF_READ_POOL_SIZE must be a positive integer: {0}")]
    InvalidReadPoolSize(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PodshelfConfig {
    pub listen_port: u16,
    pub host: IpAddr,
    pub data_dir: PathBuf,
    pub write_timeout: Duration,
    pub read_pool_size: usize,
    pub fetch_timeout: Duration,
}

impl PodshelfConfig {
    pub const DEFAULT_PORT: u16 = 5000;

    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - PODSHELF_PORT: TCP port to listen on (default: 5000)
    /// - PODSHELF_HOST: address to bind (default: 0.0.0.0)
    /// - PODSHELF_DATA_DIR: directory holding the database file (default: /data if present, else .)
    /// - PODSHELF_WRITE_TIMEOUT_MS: bound on waiting for the writer (default: 5000)
    /// - PODSHELF_READ_POOL_SIZE: number of reader connections (default: 4)
    /// - PODSHELF_FETCH_TIMEOUT_SECS: bound on downloading one feed (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_port = match get("PODSHELF_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => Self::DEFAULT_PORT,
        };

        let host = match get("PODSHELF_HOST") {
            Some(raw) => raw
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidHost(raw))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let data_dir = get("PODSHELF_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let write_timeout = match get("PODSHELF_WRITE_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) => write_timeout_from_ms(ms)?,
                Err(_) => return Err(ConfigError::InvalidWriteTimeout(raw)),
            },
            None => StoreConfig::DEFAULT_WRITE_TIMEOUT,
        };

        let read_pool_size = match get("PODSHELF_READ_POOL_SIZE") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidReadPoolSize(raw)),
            },
            None => StoreConfig::DEFAULT_READ_POOL_SIZE,
        };

        let fetch_timeout = match get("PODSHELF_FETCH_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidFetchTimeout(raw)),
            },
            None => DEFAULT_FETCH_TIMEOUT,
        };

        Ok(Self {
            listen_port,
            host,
            data_dir,
            write_timeout,
            read_pool_size,
            fetch_timeout,
        })
    }

    /// Override the write timeout, under the same rules as PODSHELF_WRITE_TIMEOUT_MS.
    pub fn with_write_timeout_ms(mut self, ms: u64) -> Result<Self, ConfigError> {
        self.write_timeout = write_timeout_from_ms(ms)?;
        Ok(self)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.listen_port)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: self.data_dir.clone(),
            write_timeout: self.write_timeout,
            read_pool_size: self.read_pool_size,
        }
    }
}

fn write_timeout_from_ms(ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidWriteTimeout(ms.to_string()));
    }
    Ok(Duration::from_millis(ms))
}

/// `/data` when running inside the container image, otherwise the working directory.
fn default_data_dir() -> PathBuf {
    let container_dir = Path::new("/data");
    if container_dir.is_dir() {
        container_dir.to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
