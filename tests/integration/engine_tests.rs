//! Integration tests for the work queue engine
//!
//! These exercise the engine through its public API with sources whose
//! streams grow while the run is in progress.

use async_trait::async_trait;
use ripple_crawl::engine::{Next, WorkItem, WorkQueue, WorkSource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Expands a binary tree of the given height: each node yields two children
struct TreeSource {
    height: u32,
    pending: Mutex<VecDeque<u32>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TreeSource {
    fn new(height: u32) -> Self {
        Self {
            height,
            pending: Mutex::new(VecDeque::from([0])),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WorkSource for TreeSource {
    type Payload = u32;
    type Output = u32;

    fn next(&self, _id: u64) -> Next<u32> {
        match self.pending.lock().unwrap().pop_front() {
            Some(level) => Next::Item(level),
            None => Next::Pending,
        }
    }

    async fn execute(&self, item: WorkItem<u32>) -> u32 {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(2)).await;

        let level = item.payload;
        if level < self.height {
            let mut pending = self.pending.lock().unwrap();
            pending.push_back(level + 1);
            pending.push_back(level + 1);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        level
    }
}

/// Never runs dry; each item sleeps until cancelled or its delay elapses
struct Endless {
    started: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl WorkSource for Endless {
    type Payload = u64;
    type Output = u64;

    fn next(&self, id: u64) -> Next<u64> {
        Next::Item(id)
    }

    async fn execute(&self, item: WorkItem<u64>) -> u64 {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        item.id
    }
}

#[tokio::test]
async fn test_lazily_growing_stream_runs_to_completion() {
    // 1 + 2 + 4 + 8 nodes
    let source = Arc::new(TreeSource::new(3));
    let queue = WorkQueue::new(Arc::clone(&source), CancellationToken::new());

    let outputs = queue.run(1_000, 3).await;

    assert_eq!(outputs.len(), 15);
    assert_eq!(outputs.iter().filter(|level| **level == 3).count(), 8);
    assert!(source.peak.load(Ordering::SeqCst) <= 3);

    let metrics = queue.metrics();
    assert_eq!(metrics.dispatched, 15);
    assert_eq!(metrics.completed, 15);
    assert!(metrics.peak_in_flight <= 3);
}

#[tokio::test]
async fn test_exactly_n_items_with_open_ended_source() {
    let source = Arc::new(Endless {
        started: AtomicUsize::new(0),
        delay: Duration::from_millis(1),
    });
    let queue = WorkQueue::new(Arc::clone(&source), CancellationToken::new());

    let mut ids = queue.run(25, 4).await;
    ids.sort();

    assert_eq!(ids, (0..25).collect::<Vec<u64>>());
    assert_eq!(source.started.load(Ordering::SeqCst), 25);
}

#[tokio::test]
async fn test_non_positive_limits_return_empty() {
    let source = Arc::new(TreeSource::new(2));
    let queue = WorkQueue::new(Arc::clone(&source), CancellationToken::new());

    assert!(queue.run(0, 4).await.is_empty());
    assert!(queue.run(-1, 4).await.is_empty());
    assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch_and_drains() {
    let cancel = CancellationToken::new();
    let source = Arc::new(Endless {
        started: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
    });
    let queue = WorkQueue::new(Arc::clone(&source), cancel.clone());

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        })
    };

    let outputs = queue.run(1_000, 2).await;
    canceller.await.unwrap();

    // The first two items were in flight when cancellation fired; both drain
    assert_eq!(outputs.len(), 2);
    assert_eq!(source.started.load(Ordering::SeqCst), 2);

    let metrics = queue.metrics();
    assert!(metrics.cancelled);
    assert_eq!(metrics.dispatched, metrics.completed);
}

#[tokio::test]
async fn test_queue_wait_is_recorded() {
    let source = Arc::new(Endless {
        started: AtomicUsize::new(0),
        delay: Duration::from_millis(10),
    });
    let queue = WorkQueue::new(source, CancellationToken::new());

    queue.run(4, 1).await;

    let metrics = queue.metrics();
    assert_eq!(metrics.dispatched, 4);
    // Items after the first waited for the single slot
    assert!(metrics.max_wait >= Duration::from_millis(5));
    assert!(metrics.average_wait() <= metrics.max_wait);
}
