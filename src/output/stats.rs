//! Timing statistics and console summaries
//!
//! This module computes response-time statistics for a finished crawl and
//! prints a human-readable summary of a [`CrawlResult`] to stdout.

use crate::crawler::CrawlResult;
use crate::output::traits::CrawlSummary;
use std::time::Duration;

/// Response-time statistics for one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingStats {
    /// Fastest response
    pub min: Duration,

    /// Slowest response
    pub max: Duration,

    /// Mean response time
    pub avg: Duration,

    /// Wall-clock duration of the whole crawl
    pub total_duration: Duration,

    /// Attempted pages per second of wall-clock time
    pub pages_per_second: f64,
}

impl TimingStats {
    /// Computes statistics from per-page response times
    ///
    /// # Arguments
    ///
    /// * `response_times` - One entry per attempted page
    /// * `total_duration` - Wall-clock time from crawl start to finish
    pub fn compute(response_times: &[Duration], total_duration: Duration) -> Self {
        if response_times.is_empty() {
            return Self {
                total_duration,
                ..Self::default()
            };
        }

        let min = response_times.iter().min().copied().unwrap_or_default();
        let max = response_times.iter().max().copied().unwrap_or_default();
        let sum: Duration = response_times.iter().sum();
        let avg = sum / response_times.len() as u32;

        let secs = total_duration.as_secs_f64();
        let pages_per_second = if secs > 0.0 {
            response_times.len() as f64 / secs
        } else {
            0.0
        };

        Self {
            min,
            max,
            avg,
            total_duration,
            pages_per_second,
        }
    }
}

/// Prints a crawl result to stdout in a formatted manner
///
/// # Arguments
///
/// * `result` - The finished (or cancelled) crawl
pub fn print_summary(result: &CrawlResult) {
    let summary = CrawlSummary::from_rows(&result.export_rows());
    let counts = &result.counts;

    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Start URL: {}", result.start_url);
    println!("  Pages attempted: {}", counts.attempted);
    println!("  Succeeded: {}", counts.succeeded);
    println!("  Failed: {}", counts.failed);
    println!("  Skipped by robots.txt: {}", counts.robots_skipped);
    println!("  Unique URLs seen: {}", counts.unique_urls);
    println!("  Links discovered: {}", counts.links_discovered);
    if counts.feed_urls > 0 {
        println!("  URLs from sitemaps/feeds: {}", counts.feed_urls);
    }
    if result.cancelled {
        println!("  Cancelled: yes ({} item(s) dropped)", counts.cancelled);
    }
    println!();

    if !summary.pages_by_state.is_empty() {
        println!("Pages by State:");
        let mut state_counts: Vec<_> = summary.pages_by_state.iter().collect();
        state_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (state, count) in state_counts {
            let percentage = (*count as f64 / summary.total_pages as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", state, count, percentage);
        }
        println!();
    }

    let timing = &result.timing;
    println!("Timing:");
    println!("  Duration: {:.2?}", timing.total_duration);
    println!(
        "  Response time: min {:.0?} / avg {:.0?} / max {:.0?}",
        timing.min, timing.avg, timing.max
    );
    println!("  Throughput: {:.2} pages/s", timing.pages_per_second);
    println!();

    let queue = &result.queue;
    println!("Queue:");
    println!(
        "  Dispatched: {} (peak {} in flight)",
        queue.dispatched, queue.peak_in_flight
    );
    println!(
        "  Wait: avg {:.0?} / max {:.0?}",
        queue.average_wait(),
        queue.max_wait
    );
    if queue.panicked > 0 {
        println!("  Panicked items: {}", queue.panicked);
    }
    if result.progress_dropped > 0 {
        println!("  Progress updates dropped: {}", result.progress_dropped);
    }
    println!();

    println!("Success Rate: {:.1}%", summary.success_rate());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_empty() {
        let stats = TimingStats::compute(&[], Duration::from_secs(2));
        assert_eq!(stats.min, Duration::ZERO);
        assert_eq!(stats.total_duration, Duration::from_secs(2));
        assert_eq!(stats.pages_per_second, 0.0);
    }

    #[test]
    fn test_compute_stats() {
        let times = [
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(200),
        ];
        let stats = TimingStats::compute(&times, Duration::from_secs(1));

        assert_eq!(stats.min, Duration::from_millis(100));
        assert_eq!(stats.max, Duration::from_millis(300));
        assert_eq!(stats.avg, Duration::from_millis(200));
        assert!((stats.pages_per_second - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_duration_has_no_throughput() {
        let stats = TimingStats::compute(&[Duration::from_millis(5)], Duration::ZERO);
        assert_eq!(stats.pages_per_second, 0.0);
    }
}
