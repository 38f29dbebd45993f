use crate::config::PreviewConfig;
use crate::queue::{queue_closed, FetchQueue, QueueStats, QueuedFetch};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use linkshelf_core::{
    CustomPreview, DocumentKey, FetchError, FetchState, MetadataFetcher, Preview, PreviewCache,
    PreviewRecord, PreviewSource, PreviewTitles, RemoteStore,
};
use moka::sync::Cache;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, trace, warn};

/// Resolves link previews across the in-memory map, the local cache, the
/// remote store and the metadata service, in that order.
///
/// One instance is created per signed-in session and shared by every consumer
/// (cloning is cheap). [`shutdown`](Self::shutdown) tears it down on sign-out.
///
/// At most one network fetch is in flight per URL: a caller asking for a URL
/// that is already loading attaches to the outstanding fetch. A URL whose
/// fetch failed stays failed until [`retry`](Self::retry) or
/// [`refetch_original`](Self::refetch_original) is called. Releasing a URL
/// cancels its fetch if the queue has not started it yet; a started fetch
/// keeps running and is adopted by the next request for that URL.
pub struct PreviewCacheManager<L, R, F> {
    inner: Arc<Inner<L, R, F>>,
}

impl<L, R, F> Clone for PreviewCacheManager<L, R, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<L, R, F> {
    previews: Cache<String, PreviewRecord>,
    slots: DashMap<String, Slot>,
    fetches: DashMap<String, PendingFetch>,
    local: L,
    remote: R,
    queue: FetchQueue<F>,
    config: PreviewConfig,
    next_generation: AtomicU64,
}

/// Transient fetch bookkeeping for one URL.
struct Slot {
    state: watch::Sender<FetchState>,
    // results from any other generation are stale
    generation: u64,
    // a forced fetch may replace a custom preview
    force: bool,
    failure: Option<FetchError>,
}

/// A fetch handed to the queue and not yet settled. Outlives its slot when
/// the URL is released after the fetch started.
struct PendingFetch {
    generation: u64,
    started: bool,
    slow: bool,
    // dropping it stops the tracking task
    _cancel: oneshot::Sender<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimMode {
    Lookup,
    Retry,
    Refetch,
}

enum Claim {
    Owner(u64),
    InFlight { slow: bool },
    Failed(FetchError),
}

fn released() -> FetchError {
    FetchError::Failure("preview request was released".to_string())
}

fn pending_state(slow: bool) -> FetchState {
    if slow {
        FetchState::Slow
    } else {
        FetchState::Loading
    }
}

impl<L, R, F> PreviewCacheManager<L, R, F>
where
    L: PreviewCache,
    R: RemoteStore,
    F: MetadataFetcher,
{
    /// Creates the manager. Must be called within a Tokio runtime, since the
    /// fetch queue spawns its worker immediately.
    pub fn new(local: L, remote: R, fetcher: F, config: PreviewConfig) -> Self {
        let previews = Cache::builder()
            .max_capacity(config.memory_capacity)
            .build();

        Self {
            inner: Arc::new(Inner {
                previews,
                slots: DashMap::new(),
                fetches: DashMap::new(),
                local,
                remote,
                queue: FetchQueue::new(fetcher),
                config,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.inner.config
    }

    pub fn local(&self) -> &L {
        &self.inner.local
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    /// Returns the preview for `url` without waiting on the network.
    ///
    /// Memory is checked first, then the local cache, then the remote store.
    /// On a miss everywhere a fetch is queued and [`Preview::Pending`] is
    /// returned; use [`settled`](Self::settled) or [`watch`](Self::watch) to
    /// follow it.
    ///
    /// The lookup runs on its own task, so dropping the returned future
    /// leaves the request in flight and a later call attaches to it.
    pub async fn get_or_fetch(&self, url: &str) -> Preview {
        self.get_or_fetch_within(url, self.inner.config.hard_timeout).await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), with a hard timeout for
    /// this request's network fetch instead of the configured one. Callers
    /// attaching to a fetch already in flight share that fetch's timeout.
    pub async fn get_or_fetch_within(&self, url: &str, hard_timeout: Duration) -> Preview {
        if let Some(record) = self.inner.previews.get(url) {
            trace!(url, "preview found in memory");
            return Preview::Success(record);
        }

        let generation = match self.claim(url, ClaimMode::Lookup) {
            Claim::Owner(generation) => generation,
            Claim::InFlight { slow } => {
                trace!(url, "attaching to in-flight preview request");
                return Preview::Pending { slow };
            }
            Claim::Failed(e) => return Preview::Failed(e),
        };

        let this = self.clone();
        let owned = url.to_string();
        let lookup = tokio::spawn(async move { this.acquire(owned, generation, hard_timeout).await });
        match lookup.await {
            Ok(preview) => preview,
            Err(e) => {
                warn!(url, error = %e, "preview lookup task failed");
                let err = FetchError::Failure(format!("preview lookup failed: {e}"));
                self.finish(url, generation, FetchState::Failed, Some(err.clone()));
                Preview::Failed(err)
            }
        }
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but waits for a pending
    /// fetch to reach its terminal outcome.
    pub async fn resolve(&self, url: &str) -> Preview {
        match self.get_or_fetch(url).await {
            Preview::Pending { .. } => self.settled(url).await,
            other => other,
        }
    }

    /// Requests previews for a list of links in display order, so network
    /// fetches are queued top to bottom. Repeated URLs are requested once.
    pub async fn request_all<I, S>(&self, urls: I) -> Vec<(String, Preview)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut previews = Vec::new();
        for url in urls {
            let url = url.as_ref();
            if !seen.insert(url.to_string()) {
                continue;
            }
            previews.push((url.to_string(), self.get_or_fetch(url).await));
        }
        previews
    }

    /// Waits until `url` is no longer loading and returns its outcome.
    pub async fn settled(&self, url: &str) -> Preview {
        let Some(mut rx) = self.watch(url) else {
            return match self.inner.previews.get(url) {
                Some(record) => Preview::Success(record),
                None => Preview::Failed(released()),
            };
        };

        let state = match rx.wait_for(|state| !state.is_pending()).await {
            Ok(state) => *state,
            Err(_) => return Preview::Failed(released()),
        };

        match state {
            FetchState::Done => match self.inner.previews.get(url) {
                Some(record) => Preview::Success(record),
                // evicted from memory in the meantime
                None => self.get_or_fetch(url).await,
            },
            FetchState::Failed => Preview::Failed(self.failure(url)),
            _ => Preview::Failed(released()),
        }
    }

    /// Starts a fresh fetch for a URL, typically one that failed.
    pub fn retry(&self, url: &str) -> Preview {
        match self.claim(url, ClaimMode::Retry) {
            Claim::Owner(generation) => {
                info!(url, "retrying preview fetch");
                self.start_fetch(url, generation, self.inner.config.hard_timeout);
                Preview::Pending { slow: false }
            }
            Claim::InFlight { slow } => Preview::Pending { slow },
            Claim::Failed(e) => Preview::Failed(e),
        }
    }

    /// Fetches the original metadata for `url`, replacing any custom preview.
    pub fn refetch_original(&self, url: &str) -> Preview {
        match self.claim(url, ClaimMode::Refetch) {
            Claim::Owner(generation) => {
                info!(url, "refetching original preview");
                self.start_fetch(url, generation, self.inner.config.hard_timeout);
                Preview::Pending { slow: false }
            }
            Claim::InFlight { slow } => Preview::Pending { slow },
            Claim::Failed(e) => Preview::Failed(e),
        }
    }

    /// Stores a user-edited preview in every tier. It is kept over any later
    /// background fetch until [`refetch_original`](Self::refetch_original).
    pub async fn set_custom_preview(&self, url: &str, fields: CustomPreview) -> PreviewRecord {
        let record = PreviewRecord::custom(url, fields);
        self.inner.previews.insert(url.to_string(), record.clone());

        if let Some(mut slot) = self.inner.slots.get_mut(url) {
            slot.force = false;
            if !slot.state.borrow().is_pending() {
                slot.failure = None;
                slot.state.send_replace(FetchState::Done);
            }
        }

        self.persist(url, &record).await;
        debug!(url, "stored custom preview");
        record
    }

    /// The current fetch state of `url`.
    pub fn state(&self, url: &str) -> FetchState {
        self.inner
            .slots
            .get(url)
            .map(|slot| *slot.state.borrow())
            .unwrap_or_default()
    }

    /// Subscribes to state changes of `url`, if it has been requested.
    pub fn watch(&self, url: &str) -> Option<watch::Receiver<FetchState>> {
        self.inner.slots.get(url).map(|slot| slot.state.subscribe())
    }

    /// The in-memory preview for `url`, without touching any other tier.
    pub fn peek(&self, url: &str) -> Option<PreviewRecord> {
        self.inner.previews.get(url)
    }

    /// Resets the fetch state of the given URLs to idle. Fetches the queue
    /// has not started yet are cancelled. A started fetch runs on; its result
    /// is discarded unless the URL is requested again before it lands.
    pub fn release<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for url in urls {
            let url = url.as_ref();
            if self.inner.slots.remove(url).is_some() {
                trace!(url, "released preview state");
            }
            if self.inner.fetches.remove_if(url, |_, fetch| !fetch.started).is_some() {
                debug!(url, "cancelled queued preview fetch");
            }
        }
    }

    /// Resets every fetch state to idle and cancels fetches that have not
    /// started. Resolved previews stay in memory.
    pub fn reset(&self) {
        self.inner.slots.clear();
        self.inner.fetches.retain(|_, fetch| fetch.started);
    }

    /// Tears down the session: stops the fetch queue and drops all in-memory
    /// previews and states. Persisted tiers are left untouched.
    pub fn shutdown(&self) {
        info!("shutting down preview session");
        self.inner.queue.close();
        self.inner.slots.clear();
        self.inner.fetches.clear();
        self.inner.previews.invalidate_all();
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    fn claim(&self, url: &str, mode: ClaimMode) -> Claim {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let force = mode == ClaimMode::Refetch;

        match self.inner.slots.entry(url.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                let current = *slot.state.borrow();
                match current {
                    FetchState::Loading | FetchState::Slow => {
                        if force {
                            slot.force = true;
                        }
                        Claim::InFlight {
                            slow: current == FetchState::Slow,
                        }
                    }
                    FetchState::Failed if mode == ClaimMode::Lookup => Claim::Failed(
                        slot.failure
                            .clone()
                            .unwrap_or_else(|| FetchError::Failure("previous fetch failed".to_string())),
                    ),
                    _ => {
                        slot.force = force;
                        slot.failure = None;
                        match self.in_flight(url) {
                            Some((adopted, slow)) => {
                                slot.generation = adopted;
                                slot.state.send_replace(pending_state(slow));
                                Claim::InFlight { slow }
                            }
                            None => {
                                slot.generation = generation;
                                slot.state.send_replace(FetchState::Loading);
                                Claim::Owner(generation)
                            }
                        }
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (claim, generation, state) = match self.in_flight(url) {
                    Some((adopted, slow)) => (Claim::InFlight { slow }, adopted, pending_state(slow)),
                    None => (Claim::Owner(generation), generation, FetchState::Loading),
                };
                let (state, _) = watch::channel(state);
                vacant.insert(Slot {
                    state,
                    generation,
                    force,
                    failure: None,
                });
                claim
            }
        }
    }

    /// Generation and slowness of a fetch still running for `url`, typically
    /// one whose slot was released after it started.
    fn in_flight(&self, url: &str) -> Option<(u64, bool)> {
        self.inner
            .fetches
            .get(url)
            .map(|fetch| (fetch.generation, fetch.slow))
    }

    /// Owner side of a lookup: reads the persisted tiers and queues a fetch
    /// on a miss.
    async fn acquire(self, url: String, generation: u64, hard_timeout: Duration) -> Preview {
        if let Some(record) = self.lookup_tiers(&url).await {
            let record = self.remember(&url, record, false);
            self.finish(&url, generation, FetchState::Done, None);
            return Preview::Success(record);
        }

        if self.pending_slot(&url, generation).is_none() {
            debug!(url = %url, "preview request released during lookup");
            return Preview::Failed(released());
        }

        self.start_fetch(&url, generation, hard_timeout);
        Preview::Pending { slow: false }
    }

    async fn lookup_tiers(&self, url: &str) -> Option<PreviewRecord> {
        match self.inner.local.get_preview(url).await {
            Ok(Some(record)) if record.is_authoritative() => {
                debug!(url, "local cache hit");
                return Some(record.read_from(PreviewSource::Local));
            }
            Ok(_) => trace!(url, "local cache miss"),
            Err(e) => warn!(url, error = %e, "local cache read failed, trying remote store"),
        }

        let key = DocumentKey::from_url(url);
        match self.inner.remote.get(&key).await {
            Ok(Some(record)) if record.is_authoritative() => {
                debug!(url, key = %key, "remote store hit, backfilling local cache");
                let record = record.read_from(PreviewSource::Remote);
                if let Err(e) = self.inner.local.set_preview(url, &record).await {
                    warn!(url, error = %e, "failed to backfill local cache");
                }
                Some(record)
            }
            Ok(Some(_)) => {
                trace!(url, key = %key, "remote store only holds a placeholder");
                None
            }
            Ok(None) => {
                trace!(url, key = %key, "remote store miss");
                None
            }
            Err(e) => {
                warn!(url, error = %e, "remote store read failed, fetching");
                None
            }
        }
    }

    fn start_fetch(&self, url: &str, generation: u64, hard_timeout: Duration) {
        let (cancel, cancelled) = oneshot::channel();
        self.inner.fetches.insert(
            url.to_string(),
            PendingFetch {
                generation,
                started: false,
                slow: false,
                _cancel: cancel,
            },
        );

        let queued = self.inner.queue.enqueue(url, hard_timeout);
        let this = self.clone();
        let url = url.to_string();
        tokio::spawn(async move { this.track(url, generation, queued, cancelled).await });
    }

    /// Follows one queued fetch: marks it slow past the threshold and applies
    /// its outcome. Returning early drops the queued job, which the worker
    /// then skips.
    async fn track(
        self,
        url: String,
        generation: u64,
        queued: QueuedFetch,
        mut cancelled: oneshot::Receiver<()>,
    ) {
        let QueuedFetch {
            started,
            mut finished,
        } = queued;

        tokio::select! {
            biased;
            _ = &mut cancelled => {
                trace!(url = %url, "queued fetch cancelled before it started");
                return;
            }
            started = started => {
                if started.is_err() {
                    self.settle(&url, generation, Err(queue_closed())).await;
                    return;
                }
            }
        }
        self.mark_started(&url, generation);

        let slow = tokio::time::sleep(self.inner.config.slow_after);
        tokio::pin!(slow);
        let mut flagged = false;
        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut cancelled => return,
                outcome = &mut finished => break outcome,
                _ = &mut slow, if !flagged => {
                    flagged = true;
                    self.mark_slow(&url, generation);
                }
            }
        };

        let result = outcome
            .unwrap_or_else(|_| Err(queue_closed()))
            .and_then(|metadata| PreviewRecord::from_metadata(&url, metadata));
        self.settle(&url, generation, result).await;
    }

    async fn settle(&self, url: &str, generation: u64, result: Result<PreviewRecord, FetchError>) {
        self.inner
            .fetches
            .remove_if(url, |_, fetch| fetch.generation == generation);

        let Some(force) = self.pending_slot(url, generation) else {
            debug!(url, generation, "discarding stale fetch result");
            return;
        };

        match result {
            Ok(record) => {
                let stored = self.remember(url, record, force);
                if stored.is_custom {
                    debug!(url, "keeping custom preview over fetched metadata");
                } else {
                    self.persist(url, &stored).await;
                }
                self.finish(url, generation, FetchState::Done, None);
                debug!(url, "preview resolved");
            }
            Err(e) => {
                warn!(url, error = %e, "preview fetch failed");
                self.finish(url, generation, FetchState::Failed, Some(e));
            }
        }
    }

    /// Returns the slot's `force` flag if `generation` is still the live,
    /// pending request for `url`.
    fn pending_slot(&self, url: &str, generation: u64) -> Option<bool> {
        self.inner
            .slots
            .get(url)
            .filter(|slot| slot.generation == generation && slot.state.borrow().is_pending())
            .map(|slot| slot.force)
    }

    fn mark_started(&self, url: &str, generation: u64) {
        if let Some(mut fetch) = self.inner.fetches.get_mut(url) {
            if fetch.generation == generation {
                fetch.started = true;
            }
        }
    }

    fn mark_slow(&self, url: &str, generation: u64) {
        if let Some(mut fetch) = self.inner.fetches.get_mut(url) {
            if fetch.generation == generation {
                fetch.slow = true;
            }
        }

        if let Some(slot) = self.inner.slots.get(url) {
            if slot.generation == generation && *slot.state.borrow() == FetchState::Loading {
                debug!(url, "preview fetch is slow");
                slot.state.send_replace(FetchState::Slow);
            }
        }
    }

    fn finish(&self, url: &str, generation: u64, state: FetchState, failure: Option<FetchError>) {
        if let Some(mut slot) = self.inner.slots.get_mut(url) {
            if slot.generation == generation {
                slot.failure = failure;
                slot.force = false;
                slot.state.send_replace(state);
            }
        }
    }

    fn failure(&self, url: &str) -> FetchError {
        self.inner
            .slots
            .get(url)
            .and_then(|slot| slot.failure.clone())
            .unwrap_or_else(released)
    }

    /// Puts a record into the in-memory map unless a custom preview is
    /// already there and `force` is not set. Returns the record now in memory.
    fn remember(&self, url: &str, record: PreviewRecord, force: bool) -> PreviewRecord {
        if !force {
            if let Some(existing) = self.inner.previews.get(url) {
                if existing.is_custom {
                    return existing;
                }
            }
        }
        self.inner.previews.insert(url.to_string(), record.clone());
        record
    }

    /// Writes a record to the local cache and the remote store. Failures are
    /// logged; the in-memory record stays usable for this session.
    async fn persist(&self, url: &str, record: &PreviewRecord) {
        let key = DocumentKey::from_url(url);
        let (local, remote) = tokio::join!(
            self.inner.local.set_preview(url, record),
            self.inner.remote.put(&key, record),
        );

        if let Err(e) = local {
            warn!(url, error = %e, "failed to write preview to local cache");
        }
        if let Err(e) = remote {
            warn!(url, key = %key, error = %e, "failed to write preview to remote store");
        }
    }
}

impl<L, R, F> PreviewTitles for PreviewCacheManager<L, R, F>
where
    L: PreviewCache,
    R: RemoteStore,
    F: MetadataFetcher,
{
    fn preview_title(&self, url: &str) -> Option<String> {
        self.peek(url)
            .filter(|record| record.is_authoritative())
            .map(|record| record.title)
    }
}
