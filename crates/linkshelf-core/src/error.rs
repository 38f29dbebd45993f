use std::time::Duration;
use thiserror::Error;

/// Type alias for storage tier results.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Failures of a storage tier (local key/value store or remote document store).
///
/// These never reach the user: the pipeline logs them and carries on with
/// whatever it already holds in memory.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

/// Why a metadata fetch did not produce a preview.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("metadata fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("metadata fetch failed: {0}")]
    Failure(String),
    #[error("metadata response is malformed: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

/// A URL that could not be normalized. Rejected before it enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed url '{url}': {reason}")]
pub struct MalformedUrl {
    pub url: String,
    pub reason: String,
}

impl MalformedUrl {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}
