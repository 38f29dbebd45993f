use async_trait::async_trait;
use linkshelf_core::{KeyValueStore, PreviewCache, PreviewRecord, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Well-known key under which all previews are stored as one JSON object
/// mapping raw URL to preview record.
pub const PREVIEW_BLOB_KEY: &str = "linkPreviewsCache";

/// The device-local preview tier.
///
/// Every preview lives in a single JSON blob inside a [`KeyValueStore`]. A blob
/// that fails to parse is discarded and the cache starts over empty; corruption
/// is never reported to the caller.
#[derive(Debug)]
pub struct LocalPreviewCache<S> {
    store: S,
    // serializes read-modify-write cycles on the blob
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> LocalPreviewCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns every cached preview.
    pub async fn snapshot(&self) -> Result<HashMap<String, PreviewRecord>> {
        self.load().await
    }

    /// Drops the whole blob.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(PREVIEW_BLOB_KEY).await
    }

    async fn load(&self) -> Result<HashMap<String, PreviewRecord>> {
        let Some(raw) = self.store.get(PREVIEW_BLOB_KEY).await? else {
            return Ok(HashMap::new());
        };

        match serde_json::from_str::<HashMap<String, PreviewRecord>>(&raw) {
            Ok(previews) => Ok(previews),
            Err(e) => {
                warn!(error = %e, "local preview cache is corrupt, discarding it");
                if let Err(e) = self.store.remove(PREVIEW_BLOB_KEY).await {
                    warn!(error = %e, "failed to remove corrupt preview cache");
                }
                Ok(HashMap::new())
            }
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> PreviewCache for LocalPreviewCache<S> {
    async fn get_preview(&self, url: &str) -> Result<Option<PreviewRecord>> {
        trace!(url, "reading preview from local cache");
        let mut previews = self.load().await?;
        Ok(previews.remove(url))
    }

    async fn set_preview(&self, url: &str, record: &PreviewRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut previews = self.load().await?;
        previews.insert(url.to_string(), record.clone());
        let raw = serde_json::to_string(&previews)?;
        self.store.put(PREVIEW_BLOB_KEY, &raw).await?;

        debug!(url, entries = previews.len(), "stored preview in local cache");
        Ok(())
    }
}
