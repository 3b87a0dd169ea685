//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files. Fetching is fail-open: any failure leaves the host
//! fully crawlable and is logged.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache, RobotsSource};
pub use parser::RobotsRules;

use crate::crawler::{FetchRequest, RequestExecutor};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Fetches robots.txt for a site
///
/// # Arguments
///
/// * `executor` - The request executor used for the crawl
/// * `site` - Any URL on the site; only its origin is used
/// * `user_agent` - The user agent whose group is selected
/// * `timeout` - Per-request timeout
/// * `cancel` - Cancellation token for the crawl
///
/// # Returns
///
/// The parsed rules, or permissive rules tagged with the reason the fetch
/// did not produce any.
pub async fn fetch_robots(
    executor: &dyn RequestExecutor,
    site: &Url,
    user_agent: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> CachedRobots {
    let robots_url = match site.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build robots.txt URL for {}: {}", site, e);
            return CachedRobots::fail_open(RobotsSource::Unreachable);
        }
    };

    match executor
        .send(FetchRequest::get(robots_url.clone(), timeout), cancel)
        .await
    {
        Ok(response) if response.is_success() => {
            let rules = RobotsRules::load(&response.body, user_agent);
            tracing::debug!(
                "Loaded {} (crawl-delay: {:?}, {} sitemap(s))",
                robots_url,
                rules.crawl_delay(),
                rules.sitemaps().len()
            );
            CachedRobots::new(rules, RobotsSource::Fetched)
        }
        Ok(response) => {
            tracing::debug!(
                "No robots.txt at {} (HTTP {}), allowing all",
                robots_url,
                response.status
            );
            CachedRobots::fail_open(RobotsSource::Missing)
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
            CachedRobots::fail_open(RobotsSource::Unreachable)
        }
    }
}
