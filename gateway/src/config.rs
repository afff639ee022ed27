//! Gateway configuration
//!
//! Loaded from a TOML file, then overlaid with `GLOBALBANK_*` environment
//! variables. Every section has defaults so an empty file is valid.
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//!
//! [ledger]
//! data_dir = "./data/ledger"
//!
//! [auth]
//! session_ttl_secs = 7200
//!
//! [plugins.server_keys]
//! survival-1 = "change-me"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use crate::logging::LogFormat;
use globalbank_auth::DEFAULT_SESSION_TTL_SECS;
use globalbank_ledger::{Config as LedgerConfig, ServerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address
    pub bind_addr: String,

    /// Ledger core settings
    pub ledger: LedgerConfig,

    /// Session settings
    pub auth: AuthConfig,

    /// Game-server plugin credentials
    pub plugins: PluginConfig,

    /// Log output
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            ledger: LedgerConfig::default(),
            auth: AuthConfig::default(),
            plugins: PluginConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in seconds
    pub session_ttl_secs: i64,

    /// Interval of the expired-session sweeper; 0 disables it
    pub sweep_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: 300,
        }
    }
}

/// Game-server plugin credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Shared secret per server ID, sent as `X-Server-Key`
    pub server_keys: BTreeMap<String, String>,
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// `pretty` or `json`
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,globalbank_gateway=debug".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl GatewayConfig {
    /// Load from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: GatewayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from an optional file, then apply the environment overlay
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `GLOBALBANK_*` environment variables
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.ledger.apply_env()?;

        if let Ok(addr) = std::env::var("GLOBALBANK_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(ttl) = std::env::var("GLOBALBANK_SESSION_TTL_SECS") {
            self.auth.session_ttl_secs = ttl.parse()?;
        }
        if let Ok(format) = std::env::var("GLOBALBANK_LOG_FORMAT") {
            self.logging.format = LogFormat::from_str_lossy(&format);
        }
        Ok(())
    }

    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.session_ttl_secs <= 0 {
            anyhow::bail!("auth.session_ttl_secs must be positive");
        }
        for (server, key) in &self.plugins.server_keys {
            ServerId::parse(server.as_str())
                .map_err(|e| anyhow::anyhow!("invalid plugin server id {:?}: {}", server, e))?;
            if key.is_empty() {
                anyhow::bail!("empty plugin key for server {}", server);
            }
        }
        Ok(())
    }
}
