use async_trait::async_trait;
use linkshelf_core::{CacheError, KeyValueStore, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A key/value store keeping one file per key under a data directory.
///
/// Writes go to a temporary file first and are then renamed into place, so a
/// crash mid-write never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
    tmp_counter: Arc<AtomicU64>,
}

fn map_io_error(operation: &str, path: &Path, err: std::io::Error) -> CacheError {
    let message = format!("{operation} '{}': {err}", path.display());
    match err.kind() {
        ErrorKind::TimedOut => CacheError::Timeout(message),
        ErrorKind::PermissionDenied | ErrorKind::NotFound => CacheError::Unavailable(message),
        ErrorKind::InvalidData => CacheError::InvalidData(message),
        _ => CacheError::Operation(message),
    }
}

impl FileKeyValueStore {
    /// Opens the store, creating the data directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| map_io_error("failed to create data directory", &root, e))?;
        debug!(root = %root.display(), "opened file key/value store");
        Ok(Self {
            root,
            tmp_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto a file name. Characters outside `[A-Za-z0-9_-]` are
    /// replaced so that keys can never escape the data directory.
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        trace!(key, "reading value from file store");

        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(key, error = %e, "failed to read value from file store");
                Err(map_io_error("failed to read", &path, e))
            }
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{seq}.tmp"));
        trace!(key, "writing value to file store");

        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| map_io_error("failed to write", &tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!(key, error = %e, "failed to move value into place");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(map_io_error("failed to rename", &path, e));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error("failed to remove", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).await.unwrap();

        assert!(store.get("sortCache_u1").await.unwrap().is_none());

        store.put("sortCache_u1", "{}").await.unwrap();
        assert_eq!(store.get("sortCache_u1").await.unwrap().as_deref(), Some("{}"));

        store.remove("sortCache_u1").await.unwrap();
        assert!(store.get("sortCache_u1").await.unwrap().is_none());
        store.remove("sortCache_u1").await.unwrap();
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileKeyValueStore::open(dir.path()).await.unwrap();
            store.put("k", "persisted").await.unwrap();
        }
        let store = FileKeyValueStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).await.unwrap();

        store.put("../outside", "x").await.unwrap();
        let path = store.path_for("../outside");
        assert_eq!(path.parent().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).await.unwrap();

        store.put("k", "one").await.unwrap();
        store.put("k", "two").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    }
}
