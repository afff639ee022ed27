//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Ledger service configuration
    pub service: ServiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "globalbank-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

/// Which store backs the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, process-local
    Memory,
    /// Durable RocksDB under `data_dir`
    RocksDb,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: StorageBackend,

    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Ledger service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Actor mailbox capacity (backpressure bound)
    pub mailbox_capacity: usize,

    /// How long a ledger call may wait to be started (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            request_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `GLOBALBANK_*` environment variables onto this config
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(data_dir) = std::env::var("GLOBALBANK_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("GLOBALBANK_STORAGE_BACKEND") {
            self.storage.backend = match backend.to_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown storage backend: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(timeout) = std::env::var("GLOBALBANK_REQUEST_TIMEOUT_MS") {
            self.service.request_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid GLOBALBANK_REQUEST_TIMEOUT_MS: {}", e))
            })?;
        }

        Ok(())
    }
}
