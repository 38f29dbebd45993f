use crate::error::{FetchError, Result};
use crate::preview::PreviewRecord;
use crate::sort::SortPreference;
use crate::url::DocumentKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A device-private string key/value store (the persistent local tier).
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns `Ok(None)` if the key is not present.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key. It is not an error if the key does not exist.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// A preview cache addressed by raw URL.
///
/// This is the shape of the local tier as seen by the preview pipeline.
#[async_trait]
pub trait PreviewCache: Send + Sync + 'static {
    /// Returns `Ok(None)` if no record is cached for `url`.
    async fn get_preview(&self, url: &str) -> Result<Option<PreviewRecord>>;

    async fn set_preview(&self, url: &str, record: &PreviewRecord) -> Result<()>;
}

/// The shared document store holding previews, addressed by [`DocumentKey`].
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Returns `Ok(None)` if there is no document under `key`.
    async fn get(&self, key: &DocumentKey) -> Result<Option<PreviewRecord>>;

    async fn put(&self, key: &DocumentKey, record: &PreviewRecord) -> Result<()>;
}

/// The user's remote profile document, consulted for sort preferences when
/// nothing is stored locally.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn sort_preference(&self, user_id: &str) -> Result<Option<SortPreference>>;

    async fn set_sort_preference(&self, user_id: &str, preference: &SortPreference) -> Result<()>;
}

/// Page metadata as returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub success: bool,
}

impl PageMetadata {
    /// Treats an explicit `success: false` exactly like a failed call.
    pub fn into_result(self, url: &str) -> std::result::Result<Self, FetchError> {
        if self.success {
            Ok(self)
        } else {
            Err(FetchError::Failure(format!(
                "metadata service reported failure for {url}"
            )))
        }
    }
}

/// The remote metadata scraping service. Unreliable and possibly slow.
#[async_trait]
pub trait MetadataFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str, timeout: Duration) -> std::result::Result<PageMetadata, FetchError>;
}
