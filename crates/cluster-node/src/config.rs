//! # Node Configuration
//!
//! Options a cluster hands to every node it creates. The node forwards them
//! to its monitor and connection pool without interpreting them itself.
//!
//! # Config File Format
//!
//! ```toml
//! connect_timeout_ms = 10000
//! heartbeat_frequency_ms = 10000
//! min_heartbeat_frequency_ms = 500
//! monitor_stop_timeout_ms = 1000
//!
//! [pool]
//! max_pool_size = 5
//! min_pool_size = 0
//! wait_queue_timeout_ms = 1000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Per-node options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeOptions {
    /// Budget for establishing a connection or completing a heartbeat.
    pub connect_timeout_ms: u64,
    /// Period of the background refresh loop.
    pub heartbeat_frequency_ms: u64,
    /// Lower bound between two scans, even when a scan is requested early.
    pub min_heartbeat_frequency_ms: u64,
    /// How long stopping the monitor waits for an in-flight scan.
    pub monitor_stop_timeout_ms: u64,
    /// Pool sizing, forwarded to the pool factory.
    pub pool: PoolOptions,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            heartbeat_frequency_ms: 10_000,
            min_heartbeat_frequency_ms: 500,
            monitor_stop_timeout_ms: 1_000,
            pool: PoolOptions::default(),
        }
    }
}

impl NodeOptions {
    /// Options with short timings for tests.
    pub fn for_testing() -> Self {
        Self {
            connect_timeout_ms: 200,
            heartbeat_frequency_ms: 50,
            min_heartbeat_frequency_ms: 10,
            monitor_stop_timeout_ms: 100,
            pool: PoolOptions::for_testing(),
        }
    }

    /// Parse options from TOML text, then validate them.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: NodeOptions =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject option combinations the monitor or pool cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_frequency_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_frequency_ms must be positive".into(),
            ));
        }
        if self.min_heartbeat_frequency_ms > self.heartbeat_frequency_ms {
            return Err(ConfigError::Invalid(format!(
                "min_heartbeat_frequency_ms ({}) exceeds heartbeat_frequency_ms ({})",
                self.min_heartbeat_frequency_ms, self.heartbeat_frequency_ms
            )));
        }
        if self.pool.min_pool_size > self.pool.max_pool_size {
            return Err(ConfigError::Invalid(format!(
                "min_pool_size ({}) exceeds max_pool_size ({})",
                self.pool.min_pool_size, self.pool.max_pool_size
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_frequency(&self) -> Duration {
        Duration::from_millis(self.heartbeat_frequency_ms)
    }

    pub fn min_heartbeat_frequency(&self) -> Duration {
        Duration::from_millis(self.min_heartbeat_frequency_ms)
    }

    pub fn monitor_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_stop_timeout_ms)
    }
}

/// Connection pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolOptions {
    pub max_pool_size: usize,
    pub min_pool_size: usize,
    /// How long a checkout may wait for a free connection.
    pub wait_queue_timeout_ms: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_pool_size: 5,
            min_pool_size: 0,
            wait_queue_timeout_ms: 1_000,
        }
    }
}

impl PoolOptions {
    pub fn for_testing() -> Self {
        Self {
            max_pool_size: 2,
            min_pool_size: 0,
            wait_queue_timeout_ms: 100,
        }
    }

    pub fn wait_queue_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_queue_timeout_ms)
    }
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },
    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// Values parsed but are inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
