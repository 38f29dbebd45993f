//! Ordered and filtered views over a link collection.
//!
//! [`SortedViewCache`] memoizes the ordering of a collection and applies the
//! search filter on every call. [`SortCacheStore`] and [`SortPreferenceStore`]
//! persist the last ordering and the user's chosen criteria across restarts.

pub mod ordering;
pub mod persist;
pub mod search;
pub mod sorted;

pub use ordering::{alphabetical_key, sort_links};
pub use persist::{sort_cache_key, sort_preference_key, SortCacheStore, SortPreferenceStore};
pub use search::{filter_links, normalize, SearchQuery};
pub use sorted::{SortedViewCache, ViewStats};
