//! Error types for the dashboard feeds and alert engine

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while a data source fetches and normalizes a feed
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Well-formed response signaling a logical error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Response did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SourceError {
    /// Creates an Upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Creates a Parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Coarse classification used when the error is surfaced
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            SourceError::Network(_) | SourceError::Http { .. } | SourceError::RateLimited => {
                FetchErrorKind::Network
            }
            SourceError::Upstream(_) => FetchErrorKind::Upstream,
            SourceError::Parse(_) => FetchErrorKind::Parse,
        }
    }
}

/// Class of a surfaced fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Network,
    Upstream,
    Parse,
}

/// Failure surfaced to consumers through a feed's state
///
/// Every [`SourceError`] collapses into this type at the scheduler boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    /// Wraps a source error with the feed it came from
    pub fn from_source(feed: &str, err: &SourceError) -> Self {
        Self {
            kind: err.kind(),
            message: format!("Failed to fetch {}: {}", feed, err),
        }
    }
}

/// Errors from the durable key-value store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by alert rule mutations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertError {
    /// Target price is NaN, infinite, zero or negative
    #[error("Target price must be a finite positive number, got {0}")]
    InvalidTargetPrice(f64),
}
