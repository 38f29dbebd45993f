use linkshelf_core::{KeyValueStore, ProfileStore, Result, SortCacheEntry, SortPreference};
use serde_json::Error as JsonError;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub fn sort_cache_key(user_id: &str) -> String {
    format!("sortCache_{user_id}")
}

pub fn sort_preference_key(user_id: &str) -> String {
    format!("sortPreferences_{user_id}")
}

/// Reads and decodes a JSON value. An entry that fails to decode is removed
/// and reported as absent.
async fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KeyValueStore,
    T: serde::de::DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            discard_corrupt(store, key, e).await;
            Ok(None)
        }
    }
}

async fn discard_corrupt<S: KeyValueStore>(store: &S, key: &str, err: JsonError) {
    warn!(key, error = %err, "discarding corrupt entry");
    if let Err(e) = store.remove(key).await {
        warn!(key, error = %e, "failed to remove corrupt entry");
    }
}

/// Persists the last valid sort cache entry per user, so a restart can reuse
/// it instead of sorting again.
#[derive(Debug)]
pub struct SortCacheStore<S> {
    store: S,
}

impl<S: KeyValueStore> SortCacheStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn load(&self, user_id: &str) -> Result<Option<SortCacheEntry>> {
        let entry = load_json(&self.store, &sort_cache_key(user_id)).await?;
        trace!(user_id, found = entry.is_some(), "loaded sort cache");
        Ok(entry)
    }

    pub async fn save(&self, user_id: &str, entry: &SortCacheEntry) -> Result<()> {
        let raw = serde_json::to_string(entry)?;
        self.store.put(&sort_cache_key(user_id), &raw).await?;
        debug!(user_id, ids = entry.ordered_ids.len(), "stored sort cache");
        Ok(())
    }

    pub async fn clear(&self, user_id: &str) -> Result<()> {
        self.store.remove(&sort_cache_key(user_id)).await
    }
}

/// Persists a user's sort preference locally, falling back to the remote
/// profile document when nothing is stored on the device.
pub struct SortPreferenceStore<S> {
    store: S,
    profile: Option<Arc<dyn ProfileStore>>,
}

impl<S: KeyValueStore> SortPreferenceStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: Arc<dyn ProfileStore>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// The stored preference. A value found only in the profile document is
    /// copied into the local store. A failing local read falls through to the
    /// profile.
    pub async fn load(&self, user_id: &str) -> Result<Option<SortPreference>> {
        let key = sort_preference_key(user_id);
        match load_json::<_, SortPreference>(&self.store, &key).await {
            Ok(Some(preference)) => {
                trace!(user_id, "sort preference found locally");
                return Ok(Some(preference));
            }
            Ok(None) => {}
            Err(e) => warn!(user_id, error = %e, "failed to read local sort preference"),
        }

        let Some(profile) = &self.profile else {
            return Ok(None);
        };

        let Some(preference) = profile.sort_preference(user_id).await? else {
            trace!(user_id, "no sort preference in profile");
            return Ok(None);
        };

        debug!(user_id, sort_by = %preference.sort_by, "sort preference restored from profile");
        match serde_json::to_string(&preference) {
            Ok(raw) => {
                if let Err(e) = self.store.put(&key, &raw).await {
                    warn!(user_id, error = %e, "failed to cache sort preference locally");
                }
            }
            Err(e) => warn!(user_id, error = %e, "failed to encode sort preference"),
        }
        Ok(Some(preference))
    }

    /// Stores the preference locally and, if configured, in the profile
    /// document. Profile failures are logged only.
    pub async fn save(&self, user_id: &str, preference: &SortPreference) -> Result<()> {
        let raw = serde_json::to_string(preference)?;
        self.store.put(&sort_preference_key(user_id), &raw).await?;
        debug!(user_id, sort_by = %preference.sort_by, sort_order = %preference.sort_order, "stored sort preference");

        if let Some(profile) = &self.profile {
            if let Err(e) = profile.set_sort_preference(user_id, preference).await {
                warn!(user_id, error = %e, "failed to store sort preference in profile");
            }
        }
        Ok(())
    }
}
