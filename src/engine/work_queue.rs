use crate::engine::metrics::QueueMetrics;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A unit of work handed to a worker
#[derive(Debug, Clone)]
pub struct WorkItem<P> {
    /// Dispatch sequence number, starting at 0
    pub id: u64,

    /// What the source produced for this id
    pub payload: P,

    /// When the item was created
    pub created_at: Instant,
}

/// Answer from a [`WorkSource`] when asked for the next item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next<P> {
    /// A new item is available
    Item(P),

    /// Nothing available right now; an in-flight item may produce more.
    /// With nothing in flight this ends the run.
    Pending,

    /// No more items will ever be produced
    Exhausted,
}

/// Lazily produces work items and executes them
///
/// `next` is called only from the dispatcher, one id at a time in ascending
/// order. `execute` runs on a worker task, up to the concurrency ceiling at
/// once.
#[async_trait]
pub trait WorkSource: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Output: Send + 'static;

    /// Produces the payload for the given id
    fn next(&self, id: u64) -> Next<Self::Payload>;

    /// Executes one item
    async fn execute(&self, item: WorkItem<Self::Payload>) -> Self::Output;
}

/// Lifecycle of a run, logged at trace level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Seeding,
    Running,
    Draining,
    Done,
}

/// Bounded-concurrency executor for a lazily generated work stream
pub struct WorkQueue<S: WorkSource> {
    source: Arc<S>,
    cancel: CancellationToken,
    metrics: Arc<Mutex<QueueMetrics>>,
}

impl<S: WorkSource> WorkQueue<S> {
    /// Creates a queue over the given source
    ///
    /// # Arguments
    ///
    /// * `source` - Produces and executes items
    /// * `cancel` - Stops dispatch when cancelled; in-flight items drain
    pub fn new(source: Arc<S>, cancel: CancellationToken) -> Self {
        Self {
            source,
            cancel,
            metrics: Arc::new(Mutex::new(QueueMetrics::default())),
        }
    }

    /// Snapshot of the metrics collected so far
    pub fn metrics(&self) -> QueueMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs items until the source is exhausted, `max_items` were dispatched,
    /// or the cancellation token fires
    ///
    /// # Arguments
    ///
    /// * `max_items` - Upper bound on dispatched items; `<= 0` returns immediately
    /// * `max_concurrency` - Worker ceiling; values below 1 are clamped to 1
    ///
    /// # Returns
    ///
    /// Outputs of every item that completed, in completion order. Items whose
    /// worker panicked produce no output and are counted in the metrics.
    pub async fn run(&self, max_items: i64, max_concurrency: usize) -> Vec<S::Output> {
        if max_items <= 0 {
            tracing::trace!(max_items, "Nothing to run");
            return Vec::new();
        }

        let limit = max_items as u64;
        let concurrency = max_concurrency.max(1);
        let mut workers: JoinSet<S::Output> = JoinSet::new();
        let mut outputs = Vec::new();
        let mut next_id: u64 = 0;
        let mut exhausted = false;
        let mut state = EngineState::Idle;

        transition(&mut state, EngineState::Seeding);
        let mut looking_since = Instant::now();

        loop {
            // Fill free slots
            while !exhausted && workers.len() < concurrency {
                if self.cancel.is_cancelled() {
                    break;
                }
                if next_id >= limit {
                    exhausted = true;
                    break;
                }

                match self.source.next(next_id) {
                    Next::Item(payload) => {
                        let item = WorkItem {
                            id: next_id,
                            payload,
                            created_at: Instant::now(),
                        };
                        next_id += 1;
                        self.spawn(&mut workers, item, looking_since);
                        looking_since = Instant::now();
                    }
                    Next::Pending => break,
                    Next::Exhausted => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if state == EngineState::Seeding {
                transition(&mut state, EngineState::Running);
            }

            if self.cancel.is_cancelled() {
                self.metrics
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .cancelled = true;
                break;
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                joined = workers.join_next() => {
                    if let Some(joined) = joined {
                        self.collect(joined, &mut outputs);
                    }
                }
                _ = self.cancel.cancelled() => {
                    self.metrics
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .cancelled = true;
                    break;
                }
            }
        }

        transition(&mut state, EngineState::Draining);
        while let Some(joined) = workers.join_next().await {
            self.collect(joined, &mut outputs);
        }

        transition(&mut state, EngineState::Done);
        outputs
    }

    fn spawn(
        &self,
        workers: &mut JoinSet<S::Output>,
        item: WorkItem<S::Payload>,
        looking_since: Instant,
    ) {
        let source = Arc::clone(&self.source);
        let metrics = Arc::clone(&self.metrics);

        {
            let mut metrics = metrics.lock().unwrap_or_else(PoisonError::into_inner);
            metrics.dispatched += 1;
            metrics.observe_in_flight(workers.len() + 1);
        }

        workers.spawn(async move {
            metrics
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_wait(looking_since.elapsed());
            source.execute(item).await
        });
    }

    fn collect(
        &self,
        joined: Result<S::Output, tokio::task::JoinError>,
        outputs: &mut Vec<S::Output>,
    ) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        match joined {
            Ok(output) => {
                metrics.completed += 1;
                outputs.push(output);
            }
            Err(e) if e.is_panic() => {
                metrics.panicked += 1;
                tracing::warn!("Work item panicked: {}", e);
            }
            Err(e) => {
                tracing::warn!("Work item did not complete: {}", e);
            }
        }
    }
}

fn transition(state: &mut EngineState, to: EngineState) {
    let from = *state;
    tracing::trace!(from = ?from, to = ?to, "Work queue state change");
    *state = to;
}
