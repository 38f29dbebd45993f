//! Storage tiers for the Linkshelf preview pipeline.
//!
//! - [`MemoryKeyValueStore`] and [`FileKeyValueStore`] back the device-local
//!   key/value store.
//! - [`LocalPreviewCache`] keeps every preview in one JSON blob inside that
//!   store and exposes it as a [`PreviewCache`](linkshelf_core::PreviewCache).
//! - [`RedisRemoteStore`] and [`InMemoryRemoteStore`] implement the shared
//!   [`RemoteStore`](linkshelf_core::RemoteStore).

pub mod file;
pub mod local;
pub mod memory;
pub mod redis;

pub use file::FileKeyValueStore;
pub use linkshelf_core::{CacheError, Result};
pub use local::{LocalPreviewCache, PREVIEW_BLOB_KEY};
pub use memory::{InMemoryProfileStore, InMemoryRemoteStore, MemoryKeyValueStore};
pub use self::redis::RedisRemoteStore;
