//! Robots.txt caching implementation
//!
//! Rules are fetched at most once per host per crawl. Concurrent requests for
//! the same host wait on a single shared fetch.

use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use url::Url;

/// Why a host ended up with the rules it has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsSource {
    /// robots.txt was fetched with a 2xx status and parsed
    Fetched,

    /// The server answered with a non-2xx status
    Missing,

    /// The request failed at the transport level
    Unreachable,
}

/// Cached robots.txt data for a host
///
/// This structure stores parsed rules along with the timestamp when they
/// were fetched and where they came from.
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The rules selected for the crawler's user agent
    pub rules: RobotsRules,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,

    /// Whether the rules came from a real file or the fail-open default
    pub source: RobotsSource,
}

impl CachedRobots {
    /// Creates a new CachedRobots instance
    ///
    /// # Arguments
    ///
    /// * `rules` - The parsed rules
    /// * `source` - Where the rules came from
    ///
    /// # Returns
    ///
    /// A new CachedRobots instance with the current timestamp
    pub fn new(rules: RobotsRules, source: RobotsSource) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
            source,
        }
    }

    /// Permissive rules recorded after a failed fetch
    pub fn fail_open(source: RobotsSource) -> Self {
        Self::new(RobotsRules::permissive(), source)
    }

    /// Returns the age of the cached robots.txt
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    /// Checks if a URL is allowed according to the cached rules
    pub fn is_allowed(&self, url: &Url) -> bool {
        self.rules.is_allowed(url)
    }

    /// Gets the crawl delay from the cached rules
    pub fn crawl_delay(&self) -> Option<std::time::Duration> {
        self.rules.crawl_delay()
    }
}

/// Per-host robots.txt cache shared by all workers
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<CachedRobots>>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for `host`, loading them on first use
    ///
    /// Only one `load` runs per host; concurrent callers wait for it. The map
    /// lock is held only long enough to find the host's cell.
    pub async fn get_or_load<F, Fut>(&self, host: &str, load: F) -> Arc<CachedRobots>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CachedRobots>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(host.to_string()).or_default())
        };

        let cached = cell.get_or_init(|| async move { Arc::new(load().await) }).await;
        Arc::clone(cached)
    }

    /// Returns the rules for `host` only if they are already loaded
    pub fn cached(&self, host: &str) -> Option<Arc<CachedRobots>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(host).and_then(|cell| cell.get().cloned())
    }

    /// Number of hosts with loaded rules
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
