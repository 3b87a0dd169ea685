//! Crawler module for web page fetching and processing
//!
//! This module contains the crawl logic built on the work queue engine:
//! - The request executor seam and a `reqwest` reference executor
//! - The frontier (visited set and breadth-first queue)
//! - HTML parsing and link extraction
//! - Per-host rate control and sitemap/feed discovery
//! - Crawl coordination, progress reporting, and results

mod coordinator;
pub mod feeds;
mod fetcher;
mod frontier;
mod parser;
mod progress;
mod rate;
mod result;

pub use coordinator::{Coordinator, CrawlMode, ItemOutcome};
pub use feeds::{parse_feed, FeedDiscovery, FeedDocument, FeedKind, FEED_PATHS};
pub use fetcher::{
    build_http_client, FetchError, FetchRequest, FetchResponse, RequestExecutor, ReqwestExecutor,
};
pub use frontier::{EnqueueOutcome, Frontier, FrontierEntry};
pub use parser::{extract_links, extract_meta_description, extract_title, parse_html, ParsedPage};
pub use progress::{LogProgressSink, ProgressChannel, ProgressEvent, ProgressSink};
pub use rate::{RateController, RateSettings};
pub use result::{CrawlCounts, CrawlProgress, CrawlResult, CrawledPage};

use crate::config::CrawlerOptions;
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a full crawl
///
/// Robots.txt, adaptive rate limiting, feed discovery, and the optional
/// sitemap and export steps are all enabled according to `options`.
///
/// # Arguments
///
/// * `start_url` - The seed URL
/// * `options` - The crawl options; validated before anything is fetched
/// * `sink` - Optional progress observer
/// * `cancel` - Cancellation token
///
/// # Returns
///
/// * `Ok(CrawlResult)` - The crawl ran (possibly partially)
/// * `Err(RippleError)` - Invalid options or start URL
pub async fn crawl(
    start_url: &str,
    options: CrawlerOptions,
    sink: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
) -> Result<CrawlResult> {
    Coordinator::full(options)?
        .crawl(start_url, sink, cancel)
        .await
}

/// Runs a simplified crawl: fixed per-host delay, no robots.txt or feeds
pub async fn crawl_simple(
    start_url: &str,
    options: CrawlerOptions,
    sink: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
) -> Result<CrawlResult> {
    Coordinator::simplified(options)?
        .crawl(start_url, sink, cancel)
        .await
}
