use linkshelf_core::{FetchError, MetadataFetcher, PageMetadata};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Result of one queued metadata fetch.
pub type FetchOutcome = Result<PageMetadata, FetchError>;

struct Job {
    url: String,
    timeout: Duration,
    started: oneshot::Sender<()>,
    done: oneshot::Sender<FetchOutcome>,
}

/// Completion signals for a fetch handed to the [`FetchQueue`].
///
/// `started` fires when the worker picks the job up, `finished` when it
/// reaches a terminal outcome. Both are dropped without a value if the queue
/// shuts down first.
#[derive(Debug)]
pub struct QueuedFetch {
    pub started: oneshot::Receiver<()>,
    pub finished: oneshot::Receiver<FetchOutcome>,
}

impl QueuedFetch {
    /// Waits for the terminal outcome.
    pub async fn wait(self) -> FetchOutcome {
        self.finished.await.unwrap_or_else(|_| Err(queue_closed()))
    }
}

/// Counters of fetches the queue has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

pub(crate) fn queue_closed() -> FetchError {
    FetchError::Failure("fetch queue is closed".to_string())
}

/// Runs metadata fetches strictly one at a time, in enqueue order.
///
/// A single worker task owns the fetcher. The next job starts only after the
/// previous one has reached a terminal outcome (success, failure or timeout);
/// a failure is counted and the queue moves on.
pub struct FetchQueue<F> {
    fetcher: Arc<F>,
    jobs: mpsc::UnboundedSender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl<F: MetadataFetcher> FetchQueue<F> {
    /// Creates the queue and spawns its worker on the current Tokio runtime.
    pub fn new(fetcher: F) -> Self {
        let fetcher = Arc::new(fetcher);
        let counters = Arc::new(Counters::default());
        let (jobs, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&fetcher), rx, Arc::clone(&counters)));

        Self {
            fetcher,
            jobs,
            worker: Mutex::new(Some(worker)),
            counters,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Appends a fetch to the queue. `timeout` is the hard ceiling for the
    /// fetch once it has started.
    pub fn enqueue(&self, url: impl Into<String>, timeout: Duration) -> QueuedFetch {
        let url = url.into();
        let (started_tx, started) = oneshot::channel();
        let (done_tx, finished) = oneshot::channel();

        trace!(url = %url, "enqueueing metadata fetch");
        let job = Job {
            url,
            timeout,
            started: started_tx,
            done: done_tx,
        };
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            // dropping the job closes both channels
            warn!(url = %job.url, "fetch queue is closed, dropping fetch");
        }

        QueuedFetch { started, finished }
    }

    /// Fetches every URL in order, one after another, and returns each
    /// outcome alongside its URL.
    pub async fn drain<I, S>(&self, urls: I, timeout: Duration) -> Vec<(String, FetchOutcome)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queued: Vec<(String, QueuedFetch)> = urls
            .into_iter()
            .map(|url| {
                let url = url.into();
                let fetch = self.enqueue(url.clone(), timeout);
                (url, fetch)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(queued.len());
        for (url, fetch) in queued {
            outcomes.push((url, fetch.wait().await));
        }
        outcomes
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops the worker. Queued and in-flight fetches are abandoned.
    pub fn close(&self) {
        if let Some(worker) = self.worker.lock().take() {
            debug!("closing fetch queue");
            worker.abort();
        }
    }
}

impl<F> Drop for FetchQueue<F> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

async fn run_worker<F: MetadataFetcher>(
    fetcher: Arc<F>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    counters: Arc<Counters>,
) {
    while let Some(job) = jobs.recv().await {
        if job.done.is_closed() {
            trace!(url = %job.url, "skipping abandoned fetch");
            continue;
        }

        let _ = job.started.send(());
        debug!(url = %job.url, "starting metadata fetch");

        let outcome = fetch_once(fetcher.as_ref(), &job.url, job.timeout).await;
        match &outcome {
            Ok(_) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(url = %job.url, "metadata fetch succeeded");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(url = %job.url, error = %e, "metadata fetch failed");
            }
        }

        let _ = job.done.send(outcome);
    }
    debug!("fetch queue worker stopped");
}

async fn fetch_once<F: MetadataFetcher>(fetcher: &F, url: &str, timeout: Duration) -> FetchOutcome {
    // On expiry the fetch future is dropped, so a late answer can never surface.
    match tokio::time::timeout(timeout, fetcher.fetch(url, timeout)).await {
        Ok(Ok(metadata)) => metadata.into_result(url),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFetcher, Step};

    const TIMEOUT: Duration = Duration::from_secs(20);

    #[tokio::test(start_paused = true)]
    async fn drain_runs_fetches_sequentially_in_order() {
        let fetcher = ScriptedFetcher::new()
            .with("https://a.com", Step::ok("A").after(Duration::from_millis(300)))
            .with("https://b.com", Step::ok("B").after(Duration::from_millis(100)))
            .with("https://c.com", Step::ok("C").after(Duration::from_millis(200)));
        let log = fetcher.log();
        let queue = FetchQueue::new(fetcher);

        let outcomes = queue
            .drain(["https://a.com", "https://b.com", "https://c.com"], TIMEOUT)
            .await;

        let titles: Vec<_> = outcomes
            .iter()
            .map(|(_, o)| o.as_ref().unwrap().title.clone().unwrap())
            .collect();
        assert_eq!(titles, ["A", "B", "C"]);
        assert_eq!(
            log.events(),
            [
                "start https://a.com",
                "end https://a.com",
                "start https://b.com",
                "end https://b.com",
                "start https://c.com",
                "end https://c.com",
            ]
        );
        assert_eq!(log.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_abort_the_queue() {
        let fetcher = ScriptedFetcher::new()
            .with("https://a.com", Step::ok("A"))
            .with("https://b.com", Step::fail("boom"))
            .with("https://c.com", Step::ok("C"));
        let queue = FetchQueue::new(fetcher);

        let outcomes = queue
            .drain(["https://a.com", "https://b.com", "https://c.com"], TIMEOUT)
            .await;

        assert!(outcomes[0].1.is_ok());
        assert!(matches!(outcomes[1].1, Err(FetchError::Failure(_))));
        assert!(outcomes[2].1.is_ok());
        assert_eq!(
            queue.stats(),
            QueueStats {
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_response_counts_as_failure() {
        let fetcher = ScriptedFetcher::new().with("https://a.com", Step::unsuccessful());
        let queue = FetchQueue::new(fetcher);

        let outcome = queue.enqueue("https://a.com", TIMEOUT).wait().await;
        assert!(matches!(outcome, Err(FetchError::Failure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn hard_timeout_fails_and_advances() {
        let fetcher = ScriptedFetcher::new()
            .with("https://slow.com", Step::ok("late").after(Duration::from_secs(25)))
            .with("https://b.com", Step::ok("B"));
        let log = fetcher.log();
        let queue = FetchQueue::new(fetcher);

        let start = tokio::time::Instant::now();
        let slow = queue.enqueue("https://slow.com", TIMEOUT);
        let next = queue.enqueue("https://b.com", TIMEOUT);

        assert_eq!(slow.wait().await, Err(FetchError::Timeout(TIMEOUT)));
        let elapsed = start.elapsed();
        assert!(elapsed >= TIMEOUT && elapsed < TIMEOUT + Duration::from_secs(1));
        assert!(next.wait().await.is_ok());

        // the abandoned fetch never completed
        assert!(!log.events().contains(&"end https://slow.com".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn started_fires_when_worker_picks_up_job() {
        let fetcher = ScriptedFetcher::new()
            .with("https://a.com", Step::ok("A").after(Duration::from_secs(5)))
            .with("https://b.com", Step::ok("B"));
        let queue = FetchQueue::new(fetcher);

        let _first = queue.enqueue("https://a.com", TIMEOUT);
        let second = queue.enqueue("https://b.com", TIMEOUT);

        let start = tokio::time::Instant::now();
        second.started.await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn closed_queue_fails_new_fetches() {
        let queue = FetchQueue::new(ScriptedFetcher::new());
        queue.close();
        // give the aborted worker a chance to drop its receiver
        tokio::task::yield_now().await;

        let outcome = queue.enqueue("https://a.com", TIMEOUT).wait().await;
        assert_eq!(outcome, Err(queue_closed()));
    }
}
