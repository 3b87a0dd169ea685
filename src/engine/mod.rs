//! Generic bounded-concurrency work queue
//!
//! The queue pulls items from a [`WorkSource`] by ascending id and keeps up to
//! a fixed number of them executing at once. When the source has nothing to
//! offer it waits for an in-flight item to finish (which may produce more
//! work) and only stops when the source is exhausted, nothing is in flight,
//! or the run is cancelled. Cancelled runs drain whatever is already in
//! flight.

mod metrics;
mod work_queue;

pub use metrics::QueueMetrics;
pub use work_queue::{Next, WorkItem, WorkQueue, WorkSource};
