use crate::ordering::sort_links;
use crate::search::filter_links;
use jiff::Timestamp;
use linkshelf_core::{fingerprint, LinkRecord, PreviewTitles, SortBy, SortCacheEntry, SortOrder};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// Counters describing how the ordering cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStats {
    pub hits: u64,
    pub misses: u64,
    /// Comparisons performed by sorts, summed over all misses.
    pub comparisons: u64,
}

#[derive(Debug, Default)]
struct State {
    entry: Option<SortCacheEntry>,
    // set when `entry` changed since the last `take_dirty`
    dirty: bool,
    stats: ViewStats,
}

/// Produces the ordered, filtered view of a link collection.
///
/// The ordering step is memoized in a single [`SortCacheEntry`], which is
/// reused for as long as the collection's id set and the sort criteria are
/// unchanged. Any change to either is picked up by the next [`view`] call,
/// which sorts from scratch and replaces the entry. Filtering is never cached.
///
/// [`view`]: SortedViewCache::view
#[derive(Debug, Default)]
pub struct SortedViewCache {
    state: Mutex<State>,
}

impl SortedViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a previously persisted entry, so that a cold start can
    /// reuse the last ordering without sorting.
    pub fn with_entry(entry: SortCacheEntry) -> Self {
        Self {
            state: Mutex::new(State {
                entry: Some(entry),
                ..Default::default()
            }),
        }
    }

    /// Returns `links` ordered by `sort_by`/`sort_order` and filtered by
    /// `query`. `titles` supplies resolved preview titles for alphabetical
    /// ordering and search.
    pub fn view<'a, T: PreviewTitles + ?Sized>(
        &self,
        links: &'a [LinkRecord],
        sort_by: SortBy,
        sort_order: SortOrder,
        query: &str,
        titles: &T,
    ) -> Vec<&'a LinkRecord> {
        let ordered = self.ordered(links, sort_by, sort_order, titles);
        filter_links(ordered, query, titles)
    }

    /// The ordering step alone.
    pub fn ordered<'a, T: PreviewTitles + ?Sized>(
        &self,
        links: &'a [LinkRecord],
        sort_by: SortBy,
        sort_order: SortOrder,
        titles: &T,
    ) -> Vec<&'a LinkRecord> {
        let fp = fingerprint(links.iter().map(|l| l.id.as_str()));
        let mut state = self.state.lock();

        if let Some(entry) = state.entry.as_ref() {
            if entry.matches(&fp, sort_by, sort_order) {
                let ordered = reuse(entry, links);
                state.stats.hits += 1;
                trace!(%sort_by, %sort_order, links = links.len(), "sort cache hit");
                return ordered;
            }
        }

        let mut ordered: Vec<&LinkRecord> = links.iter().collect();
        let comparisons = sort_links(&mut ordered, sort_by, sort_order, titles);

        state.stats.misses += 1;
        state.stats.comparisons += comparisons;
        state.entry = Some(SortCacheEntry {
            id_set_fingerprint: fp,
            sort_by,
            sort_order,
            ordered_ids: ordered.iter().map(|l| l.id.clone()).collect(),
            timestamp: Timestamp::now(),
        });
        state.dirty = true;
        debug!(%sort_by, %sort_order, links = links.len(), comparisons, "sorted collection");

        ordered
    }

    /// The current cache entry, if any.
    pub fn entry(&self) -> Option<SortCacheEntry> {
        self.state.lock().entry.clone()
    }

    /// Returns the entry if it was replaced since the last call, for
    /// persisting.
    pub fn take_dirty(&self) -> Option<SortCacheEntry> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.dirty) {
            state.entry.clone()
        } else {
            None
        }
    }

    pub fn stats(&self) -> ViewStats {
        self.state.lock().stats
    }

    /// Drops the cached entry.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entry = None;
        state.dirty = false;
    }
}

/// Maps a cached id order back onto records. Records the cached order does
/// not know about are appended in collection order.
fn reuse<'a>(entry: &SortCacheEntry, links: &'a [LinkRecord]) -> Vec<&'a LinkRecord> {
    let by_id: HashMap<&str, &LinkRecord> = links.iter().map(|l| (l.id.as_str(), l)).collect();

    let mut placed = HashSet::with_capacity(links.len());
    let mut ordered = Vec::with_capacity(links.len());
    for id in &entry.ordered_ids {
        if let Some(link) = by_id.get(id.as_str()) {
            if placed.insert(id.as_str()) {
                ordered.push(*link);
            }
        }
    }

    if ordered.len() < links.len() {
        let missing: Vec<&LinkRecord> = links
            .iter()
            .filter(|l| !placed.contains(l.id.as_str()))
            .collect();
        warn!(missing = missing.len(), "cached sort order is missing records, appending them");
        ordered.extend(missing);
    }
    ordered
}
