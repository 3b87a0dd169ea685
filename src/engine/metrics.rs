use std::time::Duration;

/// Counters collected by one [`WorkQueue`](super::WorkQueue) run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMetrics {
    /// Items handed to a worker
    pub dispatched: u64,

    /// Items whose worker returned an output
    pub completed: u64,

    /// Items whose worker panicked
    pub panicked: u64,

    /// Highest number of items in flight at once
    pub peak_in_flight: usize,

    /// Sum of per-item queue waits
    pub total_wait: Duration,

    /// Longest single queue wait
    pub max_wait: Duration,

    /// Whether dispatch stopped early because of cancellation
    pub cancelled: bool,
}

impl QueueMetrics {
    /// Records the queue wait of one item
    pub fn record_wait(&mut self, wait: Duration) {
        self.total_wait += wait;
        if wait > self.max_wait {
            self.max_wait = wait;
        }
    }

    /// Records the current in-flight count
    pub fn observe_in_flight(&mut self, in_flight: usize) {
        if in_flight > self.peak_in_flight {
            self.peak_in_flight = in_flight;
        }
    }

    /// Average queue wait over all dispatched items
    pub fn average_wait(&self) -> Duration {
        if self.dispatched == 0 {
            return Duration::ZERO;
        }
        self.total_wait / self.dispatched as u32
    }
}
