//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a crawl on top of the [`WorkQueue`] engine:
//! - Validating options and seeding the frontier
//! - Gating each claimed URL on robots.txt and the per-host rate controller
//! - Fetching, parsing, and enqueueing discovered links
//! - Publishing progress and assembling the final [`CrawlResult`]
//! - Running the optional sitemap generation and export steps

use crate::config::{validate, CrawlerOptions};
use crate::crawler::feeds::FeedDiscovery;
use crate::crawler::fetcher::{FetchError, FetchRequest, RequestExecutor, ReqwestExecutor};
use crate::crawler::frontier::{EnqueueOutcome, Frontier, FrontierEntry};
use crate::crawler::parser::parse_html;
use crate::crawler::progress::ProgressSink;
use crate::crawler::rate::{PacedExecutor, RateController, RateSettings};
use crate::crawler::result::{CrawlProgress, CrawlResult, CrawledPage, ResultCollector};
use crate::engine::{Next, WorkItem, WorkQueue, WorkSource};
use crate::output::{exporter_for, generate_sitemap, Exporter, TimingStats};
use crate::robots::{fetch_robots, CachedRobots};
use crate::state::PageState;
use crate::url::{classify_link, host_key, normalize_parsed, normalize_url, LinkScope};
use crate::{ConfigError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Which pipeline a crawl runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Robots.txt, adaptive rate control, feed discovery, sitemap, export
    Full,

    /// Fixed per-host delay only; no robots.txt, feeds, or adaptation
    Simplified,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Simplified => write!(f, "simplified"),
        }
    }
}

/// What happened to one claimed frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A request was made and a page recorded
    Fetched,

    /// robots.txt disallows the URL
    Skipped,

    /// Cancellation fired before the request started
    Cancelled,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    options: CrawlerOptions,
    mode: CrawlMode,
    executor: Arc<dyn RequestExecutor>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl Coordinator {
    /// Creates a coordinator over an explicit request executor
    ///
    /// No exporter is attached; see [`with_exporter`](Self::with_exporter).
    pub fn new(options: CrawlerOptions, mode: CrawlMode, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            options,
            mode,
            executor,
            exporter: None,
        }
    }

    /// Full crawl over the reference `reqwest` executor
    ///
    /// Attaches the reference exporter for the configured format when export
    /// is enabled.
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(RippleError)` - Invalid options or HTTP client construction failed
    pub fn full(options: CrawlerOptions) -> Result<Self> {
        Self::with_reqwest(options, CrawlMode::Full)
    }

    /// Simplified crawl over the reference `reqwest` executor
    pub fn simplified(options: CrawlerOptions) -> Result<Self> {
        Self::with_reqwest(options, CrawlMode::Simplified)
    }

    fn with_reqwest(options: CrawlerOptions, mode: CrawlMode) -> Result<Self> {
        validate(&options)?;
        let executor: Arc<dyn RequestExecutor> = Arc::new(ReqwestExecutor::new(&options.user_agent)?);

        let exporter = options
            .export
            .enabled
            .then(|| exporter_for(options.export.format, None));

        Ok(Self {
            options,
            mode,
            executor,
            exporter,
        })
    }

    /// Replaces the export collaborator
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn mode(&self) -> CrawlMode {
        self.mode
    }

    pub fn options(&self) -> &CrawlerOptions {
        &self.options
    }

    /// Crawls breadth-first from `start_url`
    ///
    /// # Arguments
    ///
    /// * `start_url` - The seed; must be an absolute http(s) URL
    /// * `sink` - Optional observer for progress, completion, and errors
    /// * `cancel` - Stops claiming new URLs when cancelled; in-flight fetches drain
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - The crawl ran, possibly partially (see `cancelled`
    ///   and [`CrawlResult::seed_failed`])
    /// * `Err(RippleError)` - Invalid options or start URL; nothing was fetched
    pub async fn crawl(
        &self,
        start_url: &str,
        sink: Option<Arc<dyn ProgressSink>>,
        cancel: CancellationToken,
    ) -> Result<CrawlResult> {
        validate(&self.options)?;
        let start = normalize_url(start_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", start_url, e)))?;

        tracing::info!("Starting {} crawl of {}", self.mode, start);
        tracing::debug!(
            "max_depth={} max_pages={} max_concurrency={}",
            self.options.max_depth,
            self.options.max_pages,
            self.options.max_concurrency
        );

        let started_at = Utc::now();
        let clock = Instant::now();

        let session = Arc::new(CrawlSession::new(
            &self.options,
            self.mode,
            Arc::clone(&self.executor),
            start.clone(),
            sink.clone(),
            cancel.clone(),
        ));
        session.frontier.seed(start.clone());

        if self.mode == CrawlMode::Full {
            session.prepare_seed(&start).await;
        }

        let queue = WorkQueue::new(Arc::clone(&session), cancel.clone());
        let outcomes = queue
            .run(
                i64::from(self.options.max_pages),
                self.options.max_concurrency,
            )
            .await;
        let queue_metrics = queue.metrics();
        let unique_urls = session.frontier.seen_len() as u64;

        tracing::debug!(
            "{} item(s) returned, {} skipped by robots.txt",
            outcomes.len(),
            outcomes
                .iter()
                .filter(|o| **o == ItemOutcome::Skipped)
                .count()
        );

        let parts = session.collector.take();

        let mut counts = parts.counts;
        counts.unique_urls = unique_urls;

        let timing = TimingStats::compute(&parts.response_times, clock.elapsed());
        let mut result = CrawlResult {
            start_url: start,
            pages: parts.pages,
            failed_pages: parts.failed_pages,
            skipped_urls: parts.skipped_urls,
            counts,
            timing,
            cancelled: cancel.is_cancelled() || queue_metrics.cancelled,
            queue: queue_metrics,
            started_at,
            finished_at: Utc::now(),
            sitemap_xml: None,
            progress_dropped: 0,
        };

        if self.mode == CrawlMode::Full && self.options.generate_sitemap {
            match generate_sitemap(&result.sitemap_entries()) {
                Ok(xml) => result.sitemap_xml = Some(xml),
                Err(e) => {
                    tracing::warn!("Sitemap generation failed: {}", e);
                    notify_error(&sink, &format!("Sitemap generation failed: {}", e));
                }
            }
        }

        if result.seed_failed() {
            let reason = result
                .failed_pages
                .iter()
                .find(|p| p.url == result.start_url)
                .and_then(|p| p.error.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::warn!("Start URL {} could not be crawled: {}", result.start_url, reason);
            notify_error(
                &sink,
                &format!("Start URL {} could not be crawled: {}", result.start_url, reason),
            );
        }

        self.export(&result, &sink).await;

        if let Some(sink) = &sink {
            result.progress_dropped = sink.dropped();
            sink.on_complete(&result);
        }

        tracing::info!(
            "Crawl finished: {} succeeded, {} failed, {} skipped{} in {:.2?}",
            result.counts.succeeded,
            result.counts.failed,
            result.counts.robots_skipped,
            if result.cancelled { " (cancelled)" } else { "" },
            result.timing.total_duration
        );

        Ok(result)
    }

    /// Runs the export collaborator on a blocking thread
    ///
    /// Failures are logged and reported to the sink; they never fail the crawl.
    async fn export(&self, result: &CrawlResult, sink: &Option<Arc<dyn ProgressSink>>) {
        if !self.options.export.enabled {
            return;
        }
        let (Some(exporter), Some(path)) = (self.exporter.clone(), self.options.export.path.clone())
        else {
            return;
        };

        let rows = result.export_rows();
        let target = path.clone();
        let outcome =
            tokio::task::spawn_blocking(move || exporter.export_rows(&rows, &target)).await;

        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("Export to {} failed: {}", path.display(), e),
            Err(e) => format!("Export task to {} did not finish: {}", path.display(), e),
        };
        tracing::warn!("{}", message);
        notify_error(sink, &message);
    }
}

fn notify_error(sink: &Option<Arc<dyn ProgressSink>>, message: &str) {
    if let Some(sink) = sink {
        sink.on_error(message);
    }
}

/// Shared state for one crawl; the engine's work source
struct CrawlSession {
    mode: CrawlMode,
    options: CrawlerOptions,
    executor: Arc<dyn RequestExecutor>,
    frontier: Frontier,
    robots: crate::robots::RobotsCache,
    rate: Arc<RateController>,
    collector: ResultCollector,
    sink: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
    started: Instant,
}

impl CrawlSession {
    fn new(
        options: &CrawlerOptions,
        mode: CrawlMode,
        executor: Arc<dyn RequestExecutor>,
        start: Url,
        sink: Option<Arc<dyn ProgressSink>>,
        cancel: CancellationToken,
    ) -> Self {
        let rate = Arc::new(match mode {
            CrawlMode::Full => RateController::new(RateSettings {
                base_delay: options.base_delay(),
                max_delay: options.max_delay(),
                adaptive: options.adaptive_rate_limit,
            }),
            CrawlMode::Simplified => RateController::fixed(options.base_delay()),
        });
        let executor: Arc<dyn RequestExecutor> =
            Arc::new(PacedExecutor::new(executor, Arc::clone(&rate)));

        Self {
            mode,
            options: options.clone(),
            executor,
            frontier: Frontier::new(start, options.max_depth, options.follow_external),
            robots: crate::robots::RobotsCache::new(),
            rate,
            collector: ResultCollector::default(),
            sink,
            cancel,
            started: Instant::now(),
        }
    }

    fn checks_robots(&self) -> bool {
        self.mode == CrawlMode::Full && self.options.respect_robots
    }

    /// Loads the seed host's robots.txt and seeds URLs from sitemaps and feeds
    async fn prepare_seed(&self, start: &Url) {
        let hints = if self.checks_robots() {
            self.robots_for(start)
                .await
                .map(|robots| robots.rules.sitemaps().to_vec())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        if !self.options.discover_feeds || self.cancel.is_cancelled() {
            return;
        }

        let discovery = FeedDiscovery::new(Arc::clone(&self.executor), self.options.timeout());
        let discovered = discovery.discover(start, &hints, &self.cancel).await;

        let root = self.frontier.root().clone();
        let mut refused = Vec::new();
        let in_scope: Vec<Url> = discovered
            .into_iter()
            .filter_map(|url| normalize_parsed(url).ok())
            .filter(|url| {
                self.options.follow_external || classify_link(url, &root) == LinkScope::Internal
            })
            .filter(|url| {
                let allowed = self.cached_robots_allow(url);
                if !allowed {
                    refused.push(url.clone());
                }
                allowed
            })
            .collect();
        let seeded = self.frontier.seed_many(in_scope) as u64;

        if !refused.is_empty() {
            tracing::debug!("{} feed URL(s) disallowed by robots.txt", refused.len());
            let refused = refused
                .into_iter()
                .filter(|url| self.frontier.try_claim(url));
            self.collector.record_skipped(refused);
        }

        self.collector.record_feed_urls(seeded);
        if seeded > 0 {
            tracing::info!("Seeded {} URL(s) from sitemaps and feeds", seeded);
        }
    }

    /// Cached robots.txt for the URL's host, loading it on first use
    ///
    /// Also lifts the host's rate floor to the crawl-delay, if any.
    async fn robots_for(&self, url: &Url) -> Option<Arc<CachedRobots>> {
        let host = host_key(url)?;
        let robots = self
            .robots
            .get_or_load(&host, || {
                fetch_robots(
                    self.executor.as_ref(),
                    url,
                    &self.options.user_agent,
                    self.options.timeout(),
                    &self.cancel,
                )
            })
            .await;

        if let Some(delay) = robots.crawl_delay() {
            self.rate.apply_crawl_delay(&host, delay);
        }
        Some(robots)
    }

    /// Whether already cached robots.txt rules allow `url`
    ///
    /// Hosts without cached rules are allowed here; the item checks them.
    fn cached_robots_allow(&self, url: &Url) -> bool {
        if !self.checks_robots() {
            return true;
        }
        host_key(url)
            .and_then(|host| self.robots.cached(&host))
            .map_or(true, |robots| robots.is_allowed(url))
    }

    /// Offers a page's links to the frontier
    ///
    /// Links on hosts whose robots.txt is already cached are checked here and
    /// never queued when disallowed.
    fn enqueue_links(&self, links: &[Url], from_depth: u32) -> EnqueueOutcome {
        if !self.checks_robots() {
            return self.frontier.enqueue_discovered(links, from_depth);
        }

        let refused = RefCell::new(Vec::new());
        let outcome = self.frontier.enqueue_filtered(links, from_depth, |url| {
            let allowed = self.cached_robots_allow(url);
            if !allowed {
                refused.borrow_mut().push(url.clone());
            }
            allowed
        });

        let refused = refused.into_inner();
        if !refused.is_empty() {
            tracing::debug!("{} link(s) disallowed by robots.txt", refused.len());
            self.collector.record_skipped(refused);
        }
        outcome
    }

    /// Performs the request for one entry
    ///
    /// Returns `None` when cancellation fired before the request started,
    /// including while it waited for the host's rate slot.
    async fn fetch_page(&self, entry: &FrontierEntry) -> Option<CrawledPage> {
        let request = FetchRequest::get(entry.url.clone(), self.options.timeout());
        let started = Instant::now();

        let response = match self.executor.send(request, &self.cancel).await {
            Ok(response) => response,
            Err(FetchError::Cancelled) => return None,
            Err(e) => {
                let state = e.page_state();
                tracing::debug!("Fetch {} failed: {}", entry.url, e);
                return Some(CrawledPage {
                    url: entry.url.clone(),
                    depth: entry.depth,
                    status: None,
                    state,
                    success: false,
                    response_time: started.elapsed(),
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                    links: Vec::new(),
                    title: None,
                    meta_description: None,
                });
            }
        };

        let status = response.status;
        let state = PageState::from_status(status);

        let mut page = CrawledPage {
            url: entry.url.clone(),
            depth: entry.depth,
            status: Some(status),
            state,
            success: state.is_success(),
            response_time: response.elapsed,
            timestamp: Utc::now(),
            error: None,
            links: Vec::new(),
            title: None,
            meta_description: None,
        };

        if !page.success {
            tracing::debug!("{} returned HTTP {}", entry.url, status);
            page.error = Some(format!("HTTP {}", status));
            return Some(page);
        }

        if response.is_html() {
            let parsed = parse_html(&response.body, &response.final_url);
            page.title = parsed.title;
            page.meta_description = parsed.meta_description;
            page.links = parsed.links;
        } else {
            tracing::trace!(
                "{} is {:?}; not parsed",
                entry.url,
                response.content_type().unwrap_or("unknown")
            );
        }

        Some(page)
    }

    fn publish_progress(&self, entry: &FrontierEntry, visited: u64) {
        let Some(sink) = &self.sink else {
            return;
        };
        let progress = CrawlProgress::estimate(
            visited,
            self.frontier.pending_len() as u64,
            u64::from(self.options.max_pages),
            entry.depth,
            entry.url.to_string(),
            self.started.elapsed(),
        );
        sink.on_progress(&progress);
    }

    fn drop_cancelled(&self, entry: &FrontierEntry) -> ItemOutcome {
        tracing::debug!("Dropping {} after cancellation", entry.url);
        self.collector.record_cancelled();
        ItemOutcome::Cancelled
    }
}

#[async_trait]
impl WorkSource for CrawlSession {
    type Payload = FrontierEntry;
    type Output = ItemOutcome;

    fn next(&self, _id: u64) -> Next<FrontierEntry> {
        match self.frontier.next_pending() {
            Some(entry) => Next::Item(entry),
            None => Next::Pending,
        }
    }

    async fn execute(&self, item: WorkItem<FrontierEntry>) -> ItemOutcome {
        let entry = item.payload;
        if self.cancel.is_cancelled() {
            return self.drop_cancelled(&entry);
        }

        if self.checks_robots() {
            if let Some(robots) = self.robots_for(&entry.url).await {
                if !robots.is_allowed(&entry.url) {
                    tracing::debug!("Disallowed by robots.txt: {}", entry.url);
                    self.collector.record_skipped([entry.url.clone()]);
                    return ItemOutcome::Skipped;
                }
            }
        }

        let Some(page) = self.fetch_page(&entry).await else {
            return self.drop_cancelled(&entry);
        };

        if !page.links.is_empty() {
            let outcome = self.enqueue_links(&page.links, entry.depth);
            tracing::trace!("{}: {:?}", entry.url, outcome);
        }

        tracing::debug!(
            "[{}] {} (depth {}, {} link(s))",
            page.state,
            entry.url,
            entry.depth,
            page.links.len()
        );

        let visited = self.collector.record_page(page);
        self.publish_progress(&entry, visited);
        ItemOutcome::Fetched
    }
}
