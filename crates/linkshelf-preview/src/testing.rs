//! A scripted metadata fetcher for pipeline tests.

use async_trait::async_trait;
use linkshelf_core::{FetchError, MetadataFetcher, PageMetadata};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Answer {
    Title(String),
    Untitled,
    Unsuccessful,
    Fail(String),
}

/// One scripted answer, optionally delayed.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    delay: Duration,
    answer: Answer,
}

impl Step {
    pub(crate) fn ok(title: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            answer: Answer::Title(title.to_string()),
        }
    }

    pub(crate) fn untitled() -> Self {
        Self {
            delay: Duration::ZERO,
            answer: Answer::Untitled,
        }
    }

    pub(crate) fn unsuccessful() -> Self {
        Self {
            delay: Duration::ZERO,
            answer: Answer::Unsuccessful,
        }
    }

    pub(crate) fn fail(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            answer: Answer::Fail(message.to_string()),
        }
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<String>,
    calls: HashMap<String, usize>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Shared record of what the fetcher was asked to do.
#[derive(Debug, Clone, Default)]
pub(crate) struct FetchLog {
    state: Arc<Mutex<LogState>>,
}

impl FetchLog {
    pub(crate) fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.state.lock().calls.get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// URLs in the order their fetches started.
    pub(crate) fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start ").map(str::to_string))
            .collect()
    }
}

struct InFlightGuard(FetchLog);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.state.lock().in_flight -= 1;
    }
}

/// Answers each URL from a script. When several steps are scripted for a URL
/// they are used in turn and the last one repeats; unscripted URLs succeed
/// immediately with the URL as title.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    log: FetchLog,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, url: &str, step: Step) -> Self {
        self.steps
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(step);
        self
    }

    pub(crate) fn log(&self) -> FetchLog {
        self.log.clone()
    }

    fn next_step(&self, url: &str) -> Step {
        let mut steps = self.steps.lock();
        match steps.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Step::ok(url)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Step::ok(url)),
            None => Step::ok(url),
        }
    }
}

#[async_trait]
impl MetadataFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<PageMetadata, FetchError> {
        let step = self.next_step(url);
        {
            let mut state = self.log.state.lock();
            state.events.push(format!("start {url}"));
            *state.calls.entry(url.to_string()).or_default() += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        let _guard = InFlightGuard(self.log.clone());

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        self.log.state.lock().events.push(format!("end {url}"));

        match step.answer {
            Answer::Title(title) => Ok(PageMetadata {
                title: Some(title),
                description: Some(format!("About {url}")),
                image: None,
                site_name: Some("Example".to_string()),
                success: true,
            }),
            Answer::Untitled => Ok(PageMetadata {
                success: true,
                ..Default::default()
            }),
            Answer::Unsuccessful => Ok(PageMetadata::default()),
            Answer::Fail(message) => Err(FetchError::Failure(message)),
        }
    }
}
