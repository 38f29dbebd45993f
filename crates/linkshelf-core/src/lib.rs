//! Core types and traits for the Linkshelf preview pipeline.
//!
//! This crate holds the data model shared by every tier (link records,
//! preview records, sort cache entries), the cache key derivations that must
//! stay compatible with previously stored data, and the traits through which
//! the pipeline talks to its external collaborators.

pub mod error;
pub mod link;
pub mod preview;
pub mod sort;
pub mod store;
pub mod url;

pub use error::{CacheError, FetchError, MalformedUrl, Result};
pub use link::{detect_platform, LinkRecord};
pub use preview::{
    CustomPreview, FetchState, Preview, PreviewRecord, PreviewSource, PreviewTitles,
    PLACEHOLDER_TITLE,
};
pub use sort::{fingerprint, SortBy, SortCacheEntry, SortOrder, SortPreference};
pub use store::{KeyValueStore, MetadataFetcher, PageMetadata, PreviewCache, ProfileStore, RemoteStore};
pub use url::{normalize_url, DocumentKey};
