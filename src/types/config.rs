//! Configuration structures.
//!
//! Configuration is loaded from a JSON file and environment variable overrides.
//! Every section defaults, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::{Error, Result};

/// Environment variable overriding [`PathsConfig::certs_path`].
pub const ENV_CERTS_PATH: &str = "ENDPOINT_BRIDGE_CERTS_PATH";
/// Environment variable overriding [`ObservabilityConfig::log_level`].
pub const ENV_LOG_LEVEL: &str = "ENDPOINT_BRIDGE_LOG_LEVEL";
/// Environment variable overriding [`WorkerConfig::worker_threads`].
pub const ENV_WORKER_THREADS: &str = "ENDPOINT_BRIDGE_WORKER_THREADS";

/// Global bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Worker execution context.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Event dispatcher behaviour.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Filesystem locations handed to the native layer.
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `ENDPOINT_BRIDGE_*` environment overrides in place.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(ENV_CERTS_PATH) {
            self.paths.certs_path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.observability.log_level = level;
        }
        if let Some(threads) = lookup(ENV_WORKER_THREADS) {
            let threads = threads.parse::<usize>().map_err(|e| {
                Error::validation(format!("{} must be a positive integer: {}", ENV_WORKER_THREADS, e))
            })?;
            if threads == 0 {
                return Err(Error::validation(format!("{} must be at least 1", ENV_WORKER_THREADS)));
            }
            self.worker.worker_threads = threads;
        }
        Ok(())
    }
}

/// Worker execution context configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Async worker threads of an owned runtime.
    pub worker_threads: usize,

    /// Upper bound on concurrently running blocking calls.
    pub max_blocking_threads: usize,

    /// Thread name prefix for an owned runtime.
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_blocking_threads: 64,
            thread_name: "endpoint-bridge-worker".to_string(),
        }
    }
}

/// Event dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// How long shutdown waits for the pump to observe its break event.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Close every open upstream subscription when the dispatcher shuts down.
    pub close_channels_on_shutdown: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
            close_channels_on_shutdown: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Trust-anchor (certificate chain) file written by the provisioning step.
    pub certs_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            certs_path: std::env::temp_dir().join("endpoint-bridge-chain.pem"),
        }
    }
}

impl PathsConfig {
    /// Fail unless the trust anchor has been provisioned.
    pub fn ensure_trust_anchor(&self) -> Result<&Path> {
        if self.certs_path.is_file() {
            Ok(&self.certs_path)
        } else {
            Err(Error::validation(format!(
                "trust anchor not provisioned at {}",
                self.certs_path.display()
            )))
        }
    }
}
