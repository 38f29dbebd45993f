//! The link-preview acquisition pipeline.
//!
//! [`PreviewCacheManager`] resolves a preview for a URL by consulting, in
//! order, its in-memory map, the device-local cache, the shared remote store,
//! and finally the metadata service. Network fetches go through a
//! [`FetchQueue`], which runs them one at a time in request order.
//!
//! # Example
//!
//! ```rust,no_run
//! use linkshelf_cache::{InMemoryRemoteStore, LocalPreviewCache, MemoryKeyValueStore};
//! use linkshelf_preview::{HttpMetadataFetcher, PreviewCacheManager, PreviewConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpMetadataFetcher::new("https://metadata.example/fetch")?;
//! let manager = PreviewCacheManager::new(
//!     LocalPreviewCache::new(MemoryKeyValueStore::new()),
//!     InMemoryRemoteStore::new(),
//!     fetcher,
//!     PreviewConfig::default(),
//! );
//!
//! let preview = manager.resolve("https://example.com").await;
//! if let Some(record) = preview.record() {
//!     println!("{}", record.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod manager;
pub mod queue;

pub use config::PreviewConfig;
pub use http::HttpMetadataFetcher;
pub use manager::PreviewCacheManager;
pub use queue::{FetchOutcome, FetchQueue, QueueStats, QueuedFetch};

#[cfg(test)]
pub(crate) mod testing;
