//! Crawl frontier: visited set plus FIFO pending queue
//!
//! A URL can be claimed at most once per crawl. Claiming and queueing happen
//! under one lock, so two workers discovering the same link cannot both
//! queue it.

use crate::url::{classify_link, normalize_parsed, LinkScope};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL; unique across the crawl
    pub url: Url,

    /// Link distance from a seed (seeds are depth 0)
    pub depth: u32,

    /// When the URL was first claimed
    pub discovered_at: DateTime<Utc>,
}

/// What happened to a batch of discovered links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// Newly claimed and queued
    pub queued: usize,

    /// Already claimed earlier in the crawl
    pub duplicates: usize,

    /// External links while external links are not followed
    pub out_of_scope: usize,

    /// Would exceed the maximum depth
    pub too_deep: usize,

    /// Not a crawlable http(s) URL
    pub invalid: usize,

    /// Claimed but refused by the caller's gate
    pub rejected: usize,
}

#[derive(Debug, Default)]
struct FrontierInner {
    seen: HashSet<String>,
    pending: VecDeque<FrontierEntry>,
}

/// Concurrency-safe pending queue and visited set
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    root: Url,
    max_depth: u32,
    follow_external: bool,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `root` - The start URL; links are classified against its host
    /// * `max_depth` - Deepest depth a queued entry may have
    /// * `follow_external` - Whether links to other hosts are queued
    pub fn new(root: Url, max_depth: u32, follow_external: bool) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            root,
            max_depth,
            follow_external,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims a URL without queueing it
    ///
    /// Returns true iff the URL had never been claimed before. The claim is
    /// permanent.
    pub fn try_claim(&self, url: &Url) -> bool {
        self.lock().seen.insert(url.as_str().to_string())
    }

    /// Claims and queues a seed at depth 0
    pub fn seed(&self, url: Url) -> bool {
        let mut inner = self.lock();
        if !inner.seen.insert(url.as_str().to_string()) {
            return false;
        }
        inner.pending.push_back(FrontierEntry {
            url,
            depth: 0,
            discovered_at: Utc::now(),
        });
        true
    }

    /// Seeds several URLs, returning how many were new
    pub fn seed_many<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = Url>,
    {
        urls.into_iter().filter(|url| self.seed(url.clone())).count()
    }

    /// Offers links found on a page at `from_depth`
    ///
    /// Links are normalized, filtered by depth and scope, then claimed; only
    /// newly claimed links are queued at `from_depth + 1`.
    pub fn enqueue_discovered(&self, urls: &[Url], from_depth: u32) -> EnqueueOutcome {
        self.enqueue_filtered(urls, from_depth, |_| true)
    }

    /// Like [`enqueue_discovered`](Self::enqueue_discovered), but `gate` may
    /// refuse a claimed URL
    ///
    /// Refused URLs stay claimed so they are never offered again.
    pub fn enqueue_filtered<G>(&self, urls: &[Url], from_depth: u32, gate: G) -> EnqueueOutcome
    where
        G: Fn(&Url) -> bool,
    {
        let mut outcome = EnqueueOutcome::default();
        let depth = from_depth.saturating_add(1);

        if depth > self.max_depth {
            outcome.too_deep = urls.len();
            return outcome;
        }

        let mut accepted = Vec::with_capacity(urls.len());
        for url in urls {
            let normalized = match normalize_parsed(url.clone()) {
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!("Skipping link {}: {}", url, e);
                    outcome.invalid += 1;
                    continue;
                }
            };

            if !self.follow_external && classify_link(&normalized, &self.root) == LinkScope::External {
                outcome.out_of_scope += 1;
                continue;
            }

            accepted.push(normalized);
        }

        let mut inner = self.lock();
        for url in accepted {
            if !inner.seen.insert(url.as_str().to_string()) {
                outcome.duplicates += 1;
                continue;
            }
            if !gate(&url) {
                outcome.rejected += 1;
                continue;
            }
            inner.pending.push_back(FrontierEntry {
                url,
                depth,
                discovered_at: Utc::now(),
            });
            outcome.queued += 1;
        }

        outcome
    }

    /// Pops the oldest pending entry (breadth-first order)
    pub fn next_pending(&self) -> Option<FrontierEntry> {
        self.lock().pending.pop_front()
    }

    /// Number of entries waiting to be crawled
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of distinct URLs claimed so far
    pub fn seen_len(&self) -> usize {
        self.lock().seen.len()
    }

    /// The start URL links are classified against
    pub fn root(&self) -> &Url {
        &self.root
    }
}
