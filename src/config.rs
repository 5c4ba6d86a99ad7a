//! Evaluation settings.
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

pub const ENV_MAX_CHUNK_BYTES: &str = "LAZYARRAY_MAX_CHUNK_BYTES";
pub const ENV_PARALLEL: &str = "LAZYARRAY_PARALLEL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    Env { key: &'static str, value: String },
}

/// Controls how an expression is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Target working set of one chunk, in bytes.
    pub max_chunk_bytes: usize,
    /// Resolve chunks on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES, parallel: false }
    }
}

impl EvalConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overridden by `LAZYARRAY_MAX_CHUNK_BYTES` and `LAZYARRAY_PARALLEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_MAX_CHUNK_BYTES) {
            config.max_chunk_bytes = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { key: ENV_MAX_CHUNK_BYTES, value: value.clone() })?;
        }
        if let Some(value) = lookup(ENV_PARALLEL) {
            config.parallel = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ConfigError::Env { key: ENV_PARALLEL, value }),
            };
        }
        Ok(config)
    }

    pub fn with_max_chunk_bytes(mut self, bytes: usize) -> Self {
        self.max_chunk_bytes = bytes;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
