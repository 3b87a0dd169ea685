//! Crawl results and progress snapshots
//!
//! Pages are appended by workers through a [`ResultCollector`]; once the
//! crawl ends the collector is turned into an immutable [`CrawlResult`].

use crate::engine::QueueMetrics;
use crate::output::{ExportRow, SitemapEntry, TimingStats};
use crate::state::PageState;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// One fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    /// Normalized URL that was requested
    pub url: Url,

    /// Link distance from a seed
    pub depth: u32,

    /// HTTP status, if a response arrived
    pub status: Option<u16>,

    /// Classification of the attempt
    pub state: PageState,

    /// True for 2xx responses
    pub success: bool,

    /// Time from sending the request to reading the body
    pub response_time: Duration,

    /// When the attempt finished
    pub timestamp: DateTime<Utc>,

    /// Transport or HTTP error detail for failed attempts
    pub error: Option<String>,

    /// Links found on the page (HTML successes only)
    pub links: Vec<Url>,

    pub title: Option<String>,
    pub meta_description: Option<String>,
}

impl CrawledPage {
    /// Flattens the page for export
    pub fn to_export_row(&self) -> ExportRow {
        ExportRow {
            url: self.url.to_string(),
            depth: self.depth,
            status_code: self.status,
            state: self.state,
            title: self.title.clone(),
            meta_description: self.meta_description.clone(),
            response_time_ms: self.response_time.as_millis() as u64,
            fetched_at: self.timestamp,
            error: self.error.clone(),
            link_count: self.links.len(),
        }
    }
}

/// Counters for a whole crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounts {
    /// Pages fetched or attempted (successes plus failures)
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,

    /// URLs not fetched because robots.txt disallows them
    pub robots_skipped: u64,

    /// Claimed items dropped because cancellation fired before their request
    pub cancelled: u64,

    /// Links extracted from successful pages, before filtering
    pub links_discovered: u64,

    /// Distinct URLs claimed by the frontier
    pub unique_urls: u64,

    /// URLs seeded from sitemaps and feeds
    pub feed_urls: u64,
}

/// Outcome of a crawl
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Normalized start URL
    pub start_url: Url,

    /// Successful pages, in completion order
    pub pages: Vec<CrawledPage>,

    /// Failed attempts, in completion order
    pub failed_pages: Vec<CrawledPage>,

    /// URLs skipped because robots.txt disallows them
    pub skipped_urls: Vec<Url>,

    pub counts: CrawlCounts,
    pub timing: TimingStats,
    pub queue: QueueMetrics,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Whether the crawl stopped because of cancellation
    pub cancelled: bool,

    /// Sitemap of successful pages, when requested
    pub sitemap_xml: Option<String>,

    /// Progress updates the observer channel could not accept
    pub progress_dropped: u64,
}

impl CrawlResult {
    /// True when the start URL itself could not be crawled
    pub fn seed_failed(&self) -> bool {
        self.pages.iter().all(|p| p.url != self.start_url)
            && self.failed_pages.iter().any(|p| p.url == self.start_url)
    }

    /// Number of fetch attempts recorded
    pub fn total_attempted(&self) -> usize {
        self.pages.len() + self.failed_pages.len()
    }

    /// Wall-clock duration of the crawl
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Every attempt, successes first
    pub fn all_pages(&self) -> impl Iterator<Item = &CrawledPage> {
        self.pages.iter().chain(self.failed_pages.iter())
    }

    /// Rows handed to an exporter
    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.all_pages().map(CrawledPage::to_export_row).collect()
    }

    /// Sitemap entries for the successful pages
    pub fn sitemap_entries(&self) -> Vec<SitemapEntry> {
        self.pages
            .iter()
            .map(|page| SitemapEntry {
                loc: page.url.to_string(),
                lastmod: Some(page.timestamp),
            })
            .collect()
    }
}

/// Snapshot pushed to observers after each completed item
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlProgress {
    /// Attempts recorded so far
    pub pages_visited: u64,

    /// Estimate of pages still to come (queued, capped by the page limit)
    pub pages_remaining: u64,

    /// Depth of the page that just completed
    pub current_depth: u32,

    /// URL of the page that just completed
    pub current_url: String,

    /// 0.0 to 100.0
    pub percent_complete: f64,

    /// Time since the crawl started
    pub elapsed: Duration,
}

impl CrawlProgress {
    /// Builds a snapshot, estimating completion against the page limit
    pub fn estimate(
        pages_visited: u64,
        queued: u64,
        max_pages: u64,
        current_depth: u32,
        current_url: String,
        elapsed: Duration,
    ) -> Self {
        let pages_remaining = queued.min(max_pages.saturating_sub(pages_visited));
        let expected = (pages_visited + pages_remaining).max(1);
        let percent_complete = (pages_visited as f64 / expected as f64 * 100.0).min(100.0);

        Self {
            pages_visited,
            pages_remaining,
            current_depth,
            current_url,
            percent_complete,
            elapsed,
        }
    }
}

#[derive(Debug, Default)]
struct Collected {
    pages: Vec<CrawledPage>,
    failed_pages: Vec<CrawledPage>,
    skipped_urls: Vec<Url>,
    response_times: Vec<Duration>,
    counts: CrawlCounts,
}

/// Single-writer accumulator shared by the workers of one crawl
#[derive(Debug, Default)]
pub(crate) struct ResultCollector {
    inner: Mutex<Collected>,
}

/// Everything collected, ready to be assembled into a [`CrawlResult`]
pub(crate) struct CollectedParts {
    pub pages: Vec<CrawledPage>,
    pub failed_pages: Vec<CrawledPage>,
    pub skipped_urls: Vec<Url>,
    pub response_times: Vec<Duration>,
    pub counts: CrawlCounts,
}

impl ResultCollector {
    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an attempt and returns the number of attempts so far
    pub fn record_page(&self, page: CrawledPage) -> u64 {
        let mut inner = self.lock();
        inner.response_times.push(page.response_time);
        inner.counts.attempted += 1;
        inner.counts.links_discovered += page.links.len() as u64;
        if page.success {
            inner.counts.succeeded += 1;
            inner.pages.push(page);
        } else {
            inner.counts.failed += 1;
            inner.failed_pages.push(page);
        }
        inner.counts.attempted
    }

    pub fn record_skipped<I>(&self, urls: I)
    where
        I: IntoIterator<Item = Url>,
    {
        let mut inner = self.lock();
        for url in urls {
            inner.counts.robots_skipped += 1;
            inner.skipped_urls.push(url);
        }
    }

    pub fn record_cancelled(&self) {
        self.lock().counts.cancelled += 1;
    }

    pub fn record_feed_urls(&self, count: u64) {
        self.lock().counts.feed_urls += count;
    }

    /// Moves everything collected so far out of the collector
    pub fn take(&self) -> CollectedParts {
        let inner = std::mem::take(&mut *self.lock());
        CollectedParts {
            pages: inner.pages,
            failed_pages: inner.failed_pages,
            skipped_urls: inner.skipped_urls,
            response_times: inner.response_times,
            counts: inner.counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, depth: u32, status: Option<u16>) -> CrawledPage {
        let state = match status {
            Some(code) => PageState::from_status(code),
            None => PageState::Unreachable,
        };
        CrawledPage {
            url: Url::parse(url).unwrap(),
            depth,
            status,
            state,
            success: state.is_success(),
            response_time: Duration::from_millis(10),
            timestamp: Utc::now(),
            error: None,
            links: Vec::new(),
            title: None,
            meta_description: None,
        }
    }

    fn result_from(collector: ResultCollector, start: &str) -> CrawlResult {
        let parts = collector.take();
        let now = Utc::now();
        CrawlResult {
            start_url: Url::parse(start).unwrap(),
            pages: parts.pages,
            failed_pages: parts.failed_pages,
            skipped_urls: parts.skipped_urls,
            counts: parts.counts,
            timing: TimingStats::default(),
            queue: QueueMetrics::default(),
            started_at: now,
            finished_at: now,
            cancelled: false,
            sitemap_xml: None,
            progress_dropped: 0,
        }
    }

    #[test]
    fn test_collector_splits_success_and_failure() {
        let collector = ResultCollector::default();
        assert_eq!(collector.record_page(page("https://example.com/", 0, Some(200))), 1);
        assert_eq!(collector.record_page(page("https://example.com/x", 1, Some(404))), 2);
        collector.record_skipped(vec![Url::parse("https://example.com/private").unwrap()]);
        collector.record_cancelled();

        let result = result_from(collector, "https://example.com/");
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.failed_pages.len(), 1);
        assert_eq!(result.counts.attempted, 2);
        assert_eq!(result.counts.robots_skipped, 1);
        assert_eq!(result.counts.cancelled, 1);
        assert_eq!(result.total_attempted(), 2);
        assert!(!result.seed_failed());
    }

    #[test]
    fn test_seed_failed() {
        let collector = ResultCollector::default();
        collector.record_page(page("https://example.com/", 0, None));

        let result = result_from(collector, "https://example.com/");
        assert!(result.seed_failed());
        assert!(result.pages.is_empty());
    }

    #[test]
    fn test_export_rows_successes_first() {
        let collector = ResultCollector::default();
        collector.record_page(page("https://example.com/gone", 1, Some(410)));
        collector.record_page(page("https://example.com/", 0, Some(200)));

        let rows = result_from(collector, "https://example.com/").export_rows();
        assert_eq!(rows[0].url, "https://example.com/");
        assert_eq!(rows[1].state, PageState::DeadLink);
    }

    #[test]
    fn test_progress_estimate() {
        let progress = CrawlProgress::estimate(
            5,
            100,
            10,
            1,
            "https://example.com/a".to_string(),
            Duration::from_secs(1),
        );
        assert_eq!(progress.pages_remaining, 5);
        assert!((progress.percent_complete - 50.0).abs() < 0.001);

        let done = CrawlProgress::estimate(3, 0, 10, 2, String::new(), Duration::ZERO);
        assert_eq!(done.pages_remaining, 0);
        assert!((done.percent_complete - 100.0).abs() < 0.001);
    }
}
