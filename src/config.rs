// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration
//!
//! Defaults, optionally overlaid by a JSON document or `DATAGATE_*`
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pool::PoolConfig;

pub const ENV_POOL_MAX_CONNECTIONS: &str = "DATAGATE_POOL_MAX_CONNECTIONS";
pub const ENV_POOL_ACQUIRE_TIMEOUT_MS: &str = "DATAGATE_POOL_ACQUIRE_TIMEOUT_MS";
pub const ENV_EVICTION_DURATION_SECS: &str = "DATAGATE_EVICTION_DURATION_SECS";
pub const ENV_LOG_FILTER: &str = "DATAGATE_LOG_FILTER";
pub const ENV_LOG_DIR: &str = "DATAGATE_LOG_DIR";

/// Pool sizing and checkout timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum wait for a free connection (milliseconds)
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionSettings {
    /// Pools idle longer than this are closed
    #[serde(default = "default_evict_after_secs")]
    pub evict_after_secs: u64,
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Overrides the per-user log directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub eviction: EvictionSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_connections() -> usize {
    PoolConfig::DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

fn default_evict_after_secs() -> u64 {
    600 // 10 minutes
}

fn default_housekeeping_interval_secs() -> u64 {
    600
}

fn default_log_filter() -> String {
    "datagate=info".to_string()
}

fn default_retention_days() -> u64 {
    14
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl Default for EvictionSettings {
    fn default() -> Self {
        Self {
            evict_after_secs: default_evict_after_secs(),
            housekeeping_interval_secs: default_housekeeping_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
            retention_days: default_retention_days(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::configuration(format!("Invalid runtime configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `DATAGATE_*` variables from the process environment
    pub fn from_env() -> EngineResult<Self> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                ENV_POOL_MAX_CONNECTIONS => {
                    config.pool.max_connections = parse_var(ENV_POOL_MAX_CONNECTIONS, &value)?
                }
                ENV_POOL_ACQUIRE_TIMEOUT_MS => {
                    config.pool.acquire_timeout_ms = parse_var(ENV_POOL_ACQUIRE_TIMEOUT_MS, &value)?
                }
                ENV_EVICTION_DURATION_SECS => {
                    config.eviction.evict_after_secs = parse_var(ENV_EVICTION_DURATION_SECS, &value)?
                }
                ENV_LOG_FILTER => config.logging.filter = value,
                ENV_LOG_DIR => config.logging.directory = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.pool.max_connections == 0 {
            return Err(EngineError::configuration(
                "pool.max_connections must be greater than zero",
            ));
        }
        if self.pool.acquire_timeout_ms == 0 {
            return Err(EngineError::configuration(
                "pool.acquire_timeout_ms must be greater than zero",
            ));
        }
        if self.eviction.housekeeping_interval_secs == 0 {
            return Err(EngineError::configuration(
                "eviction.housekeeping_interval_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.pool.max_connections,
            acquire_timeout: Duration::from_millis(self.pool.acquire_timeout_ms),
        }
    }

    pub fn evict_after(&self) -> Duration {
        Duration::from_secs(self.eviction.evict_after_secs)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.eviction.housekeeping_interval_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> EngineResult<T> {
    value.trim().parse().map_err(|_| {
        EngineError::configuration(format!("Invalid value '{value}' for {name}"))
    })
}
