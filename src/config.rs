//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

const ENV_DB_PATH: &str = "FOCUS_PROTOCOL_DB_PATH";
const ENV_PORT: &str = "FOCUS_PROTOCOL_PORT";
const ENV_LOG: &str = "FOCUS_PROTOCOL_LOG";
const ENV_RNG_SEED: &str = "FOCUS_PROTOCOL_RNG_SEED";

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Port for the REST adapter.
    pub http_port: u16,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Fixed seed for the reward scheduler. `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/focus-protocol.db"),
            http_port: 8080,
            log_filter: "info".to_string(),
            rng_seed: None,
        }
    }
}

impl AppConfig {
    /// Build the config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Unset keys keep
    /// their defaults; set-but-invalid keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.http_port = port.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_PORT.to_string(),
                message: format!("{e}"),
            })?;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }
        if let Some(seed) = lookup(ENV_RNG_SEED) {
            let seed = seed.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_RNG_SEED.to_string(),
                message: format!("{e}"),
            })?;
            config.rng_seed = Some(seed);
        }

        Ok(config)
    }
}
