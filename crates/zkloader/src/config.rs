//! Loader configuration: sources, timings, and their resolution.
//!
//! Precedence when resolving: a `ZKLOADER_CONFIG` JSON file if set, then
//! individual `ZKLOADER_*` environment variables layered on top, then the
//! built-in defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::DEFAULT_SCHEME;
use crate::types::Source;

pub const ENV_CONFIG_FILE: &str = "ZKLOADER_CONFIG";
pub const ENV_SOURCES: &str = "ZKLOADER_SOURCES";
pub const ENV_SOURCE_TIMEOUT_MS: &str = "ZKLOADER_SOURCE_TIMEOUT_MS";
pub const ENV_SETTLE_DELAY_MS: &str = "ZKLOADER_SETTLE_DELAY_MS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "ZKLOADER_RETRY_BASE_DELAY_MS";
pub const ENV_MAX_ATTEMPTS: &str = "ZKLOADER_MAX_ATTEMPTS";

/// Built-in CDN mirrors, tried in this order.
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://unpkg.com/snarkjs@latest/build/snarkjs.min.js",
    "https://cdn.jsdelivr.net/npm/snarkjs@latest/build/snarkjs.min.js",
    "https://cdn.skypack.dev/snarkjs",
];

const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors raised while resolving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid source URL {url:?}: {reason}")]
    InvalidSource { url: String, reason: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("No sources configured")]
    NoSources,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for the acquisition coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Candidate sources, tried strictly in order.
    pub sources: Vec<Source>,
    /// How long one source may take to signal completion or error.
    pub source_timeout_ms: u64,
    /// Wait between the completion signal and checking the registry slot.
    pub settle_delay_ms: u64,
    /// Linear backoff unit for `preload`: attempt `n` waits `n * base`.
    pub retry_base_delay_ms: u64,
    /// Attempt budget used by `preload_default`.
    pub max_attempts: u32,
    /// Proving scheme that `test()` requires on the loaded toolkit.
    pub required_scheme: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES
                .iter()
                .filter_map(|s| Source::parse(s).ok())
                .collect(),
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            required_scheme: DEFAULT_SCHEME.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Build a config with the given sources and default timings.
    pub fn with_sources<I, S>(sources: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sources = parse_sources(sources)?;
        Ok(Self {
            sources,
            ..Self::default()
        })
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment variables.
    ///
    /// Split out from [`LoaderConfig::from_env`] so resolution can be
    /// exercised without mutating the process environment.
    pub fn resolve<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_FILE) {
            Some(path) if !path.trim().is_empty() => {
                tracing::debug!("Reading loader config from {path}");
                Self::from_file(path.trim())?
            }
            _ => Self::default(),
        };

        if let Some(raw) = lookup(ENV_SOURCES) {
            let entries: Vec<&str> = raw.split(',').filter(|s| !s.trim().is_empty()).collect();
            config.sources = parse_sources(entries)?;
        }
        if let Some(v) = lookup(ENV_SOURCE_TIMEOUT_MS) {
            config.source_timeout_ms = parse_number(ENV_SOURCE_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_SETTLE_DELAY_MS) {
            config.settle_delay_ms = parse_number(ENV_SETTLE_DELAY_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_RETRY_BASE_DELAY_MS) {
            config.retry_base_delay_ms = parse_number(ENV_RETRY_BASE_DELAY_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_ATTEMPTS) {
            config.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        Ok(())
    }
}

fn parse_sources<I, S>(raw: I) -> ConfigResult<Vec<Source>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sources = raw
        .into_iter()
        .map(|s| {
            let s = s.as_ref();
            Source::parse(s).map_err(|e| ConfigError::InvalidSource {
                url: s.trim().to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<ConfigResult<Vec<_>>>()?;

    if sources.is_empty() {
        return Err(ConfigError::NoSources);
    }
    Ok(sources)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
