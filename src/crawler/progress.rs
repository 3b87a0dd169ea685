//! Progress reporting to crawl observers
//!
//! Observers implement [`ProgressSink`]. Sinks are called from worker tasks
//! and must never block the crawl; [`ProgressChannel`] forwards events over a
//! bounded tokio channel and drops progress snapshots when the buffer is full.

use crate::crawler::result::{CrawlProgress, CrawlResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// How long a completion or error event may wait for buffer space
pub const DEFAULT_FINAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives crawl events
///
/// Methods are called from worker tasks while the crawl runs and must
/// return quickly.
pub trait ProgressSink: Send + Sync {
    /// Called after each completed item
    fn on_progress(&self, progress: &CrawlProgress);

    /// Called once when the crawl finishes, including after cancellation
    fn on_complete(&self, result: &CrawlResult);

    /// Called for problems that do not abort the crawl (seed failure, export)
    fn on_error(&self, message: &str);

    /// Progress updates this sink had to drop
    fn dropped(&self) -> u64 {
        0
    }
}

/// Event delivered through a [`ProgressChannel`]
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Progress(CrawlProgress),
    Complete(Box<CrawlResult>),
    Error(String),
}

/// Bounded channel implementation of [`ProgressSink`]
#[derive(Debug)]
pub struct ProgressChannel {
    sender: mpsc::Sender<ProgressEvent>,
    final_timeout: Duration,
    dropped: AtomicU64,
}

impl ProgressChannel {
    /// Creates a channel with room for `capacity` buffered events
    ///
    /// # Returns
    ///
    /// The sink to hand to the crawl, and the receiving end for the observer
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let channel = Self {
            sender,
            final_timeout: DEFAULT_FINAL_TIMEOUT,
            dropped: AtomicU64::new(0),
        };
        (channel, receiver)
    }

    /// Sets how long completion and error events may wait for space
    pub fn with_final_timeout(mut self, timeout: Duration) -> Self {
        self.final_timeout = timeout;
        self
    }

    /// Delivers an event that must not be silently dropped
    ///
    /// Tries immediately; if the buffer is full, a task waits for space up to
    /// the final timeout so the caller never blocks.
    fn send_final(&self, event: ProgressEvent) {
        let event = match self.sender.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Progress receiver closed; event discarded");
                return;
            }
            Err(TrySendError::Full(event)) => event,
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Progress buffer full and no runtime to wait on; event discarded");
            return;
        };

        let sender = self.sender.clone();
        let timeout = self.final_timeout;
        handle.spawn(async move {
            if sender.send_timeout(event, timeout).await.is_err() {
                tracing::warn!("Progress observer did not accept final event within {:?}", timeout);
            }
        });
    }
}

impl ProgressSink for ProgressChannel {
    fn on_progress(&self, progress: &CrawlProgress) {
        match self.sender.try_send(ProgressEvent::Progress(progress.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn on_complete(&self, result: &CrawlResult) {
        self.send_final(ProgressEvent::Complete(Box::new(result.clone())));
    }

    fn on_error(&self, message: &str) {
        self.send_final(ProgressEvent::Error(message.to_string()));
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sink that writes events to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, progress: &CrawlProgress) {
        tracing::info!(
            "[{:>5.1}%] {} page(s), ~{} remaining, depth {}: {}",
            progress.percent_complete,
            progress.pages_visited,
            progress.pages_remaining,
            progress.current_depth,
            progress.current_url
        );
    }

    fn on_complete(&self, result: &CrawlResult) {
        tracing::info!(
            "Crawl of {} finished: {} succeeded, {} failed in {:.2?}",
            result.start_url,
            result.counts.succeeded,
            result.counts.failed,
            result.duration()
        );
    }

    fn on_error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}
