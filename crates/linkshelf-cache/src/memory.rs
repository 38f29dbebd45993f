use async_trait::async_trait;
use dashmap::DashMap;
use linkshelf_core::{
    DocumentKey, KeyValueStore, PreviewRecord, ProfileStore, RemoteStore, Result, SortPreference,
};
use std::sync::Arc;
use tracing::trace;

/// In-memory key/value store.
///
/// Clones share the same underlying map, which lets tests hand one clone to
/// the pipeline and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// In-memory implementation of the shared document store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemoteStore {
    documents: Arc<DashMap<DocumentKey, PreviewRecord>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the stored document without going through the trait.
    pub fn document(&self, key: &DocumentKey) -> Option<PreviewRecord> {
        self.documents.get(key).map(|r| r.clone())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<PreviewRecord>> {
        trace!(key = %key, "reading preview document from memory");
        Ok(self.document(key))
    }

    async fn put(&self, key: &DocumentKey, record: &PreviewRecord) -> Result<()> {
        trace!(key = %key, "writing preview document to memory");
        self.documents.insert(key.clone(), record.clone());
        Ok(())
    }
}

/// In-memory stand-in for the remote user profile document.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    preferences: Arc<DashMap<String, SortPreference>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn sort_preference(&self, user_id: &str) -> Result<Option<SortPreference>> {
        Ok(self.preferences.get(user_id).map(|p| p.clone()))
    }

    async fn set_sort_preference(&self, user_id: &str, preference: &SortPreference) -> Result<()> {
        self.preferences
            .insert(user_id.to_string(), preference.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkshelf_core::{CustomPreview, SortBy, SortOrder};

    #[tokio::test]
    async fn kv_put_get_remove() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.put("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // removing a missing key is fine
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn kv_clones_share_entries() {
        let store = MemoryKeyValueStore::new();
        let other = store.clone();
        store.put("k", "v").await.unwrap();
        assert!(other.contains_key("k"));
    }

    #[tokio::test]
    async fn remote_store_round_trip() {
        let store = InMemoryRemoteStore::new();
        let key = DocumentKey::from_url("https://a.com");
        let record = PreviewRecord::custom(
            "https://a.com",
            CustomPreview {
                title: "A".to_string(),
                ..Default::default()
            },
        );

        assert!(store.get(&key).await.unwrap().is_none());
        store.put(&key, &record).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(record));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn profile_store_round_trip() {
        let store = InMemoryProfileStore::new();
        let pref = SortPreference::new(SortBy::Platform, SortOrder::Asc);

        assert!(store.sort_preference("u1").await.unwrap().is_none());
        store.set_sort_preference("u1", &pref).await.unwrap();
        assert_eq!(store.sort_preference("u1").await.unwrap(), Some(pref));
        assert!(store.sort_preference("u2").await.unwrap().is_none());
    }
}
