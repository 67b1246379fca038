//! Core data types: sources, per-source failures, and loader errors.

use serde::{Deserialize, Serialize};
use url::Url;

/// A candidate origin the toolkit can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source {
    url: Url,
}

impl Source {
    /// Parse a source from a URL string.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(raw.trim())?,
        })
    }

    /// The source location.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl From<Url> for Source {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Why a single source was abandoned during a fallback sequence.
///
/// These never reach callers of `load()`; they are logged, emitted as
/// events, and the sequence moves on to the next source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SourceFailure {
    /// The environment reported an error for the injection.
    Error(String),
    /// The injection completed but nothing appeared in the registry slot.
    NotRegistered,
    /// Neither completion nor error arrived within the per-source timeout.
    TimedOut { after_ms: u64 },
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {msg}"),
            Self::NotRegistered => write!(f, "loaded but toolkit not registered"),
            Self::TimedOut { after_ms } => write!(f, "timed out after {after_ms}ms"),
        }
    }
}

/// Errors surfaced by the acquisition coordinator.
///
/// `Clone` so one terminal outcome can be handed to every caller that
/// joined the same attempt.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("All {count} toolkit sources failed to load")]
    SourceExhausted { count: usize },

    #[error("Failed to load toolkit after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<LoadError>,
    },

    #[error("Capability shape mismatch: {0}")]
    CapabilityShapeMismatch(String),

    #[error("Acquisition task aborted: {0}")]
    TaskAborted(String),
}

impl LoadError {
    /// Whether a retry can possibly change the outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LoadError::EnvironmentUnavailable(_))
    }
}

/// Convenience result type.
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse_trims() {
        let source = Source::parse("  https://cdn.example.com/prover.js ").unwrap();
        assert_eq!(source.as_str(), "https://cdn.example.com/prover.js");
    }

    #[test]
    fn test_source_parse_rejects_garbage() {
        assert!(Source::parse("not a url").is_err());
    }

    #[test]
    fn test_retry_exhausted_exposes_last_error() {
        use std::error::Error;

        let err = LoadError::RetryExhausted {
            attempts: 3,
            last: Box::new(LoadError::SourceExhausted { count: 3 }),
        };
        assert_eq!(err.to_string(), "Failed to load toolkit after 3 attempts");
        let source = err.source().expect("wrapped error");
        assert_eq!(source.to_string(), "All 3 toolkit sources failed to load");
    }

    #[test]
    fn test_environment_unavailable_not_retryable() {
        assert!(!LoadError::EnvironmentUnavailable("headless".into()).is_retryable());
        assert!(LoadError::SourceExhausted { count: 1 }.is_retryable());
    }

    #[test]
    fn test_source_failure_serialization() {
        let json = serde_json::to_string(&SourceFailure::TimedOut { after_ms: 10_000 }).unwrap();
        assert!(json.contains("timed_out"));
        assert!(json.contains("10000"));
    }
}
