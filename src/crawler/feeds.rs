//! Sitemap and feed discovery
//!
//! Probes the well-known sitemap/RSS/Atom locations at a site root, plus any
//! `Sitemap:` URLs from robots.txt, and returns the page URLs they list.
//! Everything here is best-effort: a failed probe is logged and skipped, and
//! malformed XML keeps whatever was read before the error.

use crate::crawler::{FetchRequest, RequestExecutor};
use crate::url::site_root;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Well-known feed locations probed at the site root
pub const FEED_PATHS: &[&str] = &["/sitemap.xml", "/rss.xml", "/feed.xml", "/atom.xml"];

/// Child sitemaps followed from one sitemap index
const MAX_CHILD_SITEMAPS: usize = 16;

/// Upper bound on URLs returned by one discovery pass
const MAX_DISCOVERED_URLS: usize = 10_000;

/// Kind of XML document a probe returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// `<urlset>` sitemap
    UrlSet,
    /// `<sitemapindex>` pointing at further sitemaps
    SitemapIndex,
    /// RSS `<rss>` or RDF feed
    Rss,
    /// Atom `<feed>`
    Atom,
    /// Anything else
    Unknown,
}

/// URLs read from one XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub kind: FeedKind,
    pub urls: Vec<String>,
}

/// Parses a sitemap, sitemap index, RSS, or Atom document
///
/// Reads `<loc>` text (sitemaps), `<link>` text (RSS), and `<link href>`
/// attributes (Atom). Stops quietly at the first XML error.
pub fn parse_feed(xml: &str) -> FeedDocument {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut kind: Option<FeedKind> = None;
    let mut capture = false;
    let mut urls = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if kind.is_none() {
                    kind = Some(root_kind(name));
                }
                capture = false;
                match name {
                    b"loc" => capture = true,
                    b"link" => match link_href(&e) {
                        Some(href) => urls.extend(href),
                        None => capture = true,
                    },
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if kind.is_none() {
                    kind = Some(root_kind(name.as_ref()));
                }
                if name.as_ref() == b"link" {
                    if let Some(href) = link_href(&e) {
                        urls.extend(href);
                    }
                }
            }
            Ok(Event::Text(t)) if capture => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim();
                    if !text.is_empty() {
                        urls.push(text.to_string());
                    }
                }
            }
            Ok(Event::CData(c)) if capture => {
                let text = String::from_utf8_lossy(&c.into_inner()).trim().to_string();
                if !text.is_empty() {
                    urls.push(text);
                }
            }
            Ok(Event::End(_)) => capture = false,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    "XML error at byte {}: {}; keeping {} URL(s)",
                    reader.buffer_position(),
                    e,
                    urls.len()
                );
                break;
            }
        }
    }

    FeedDocument {
        kind: kind.unwrap_or(FeedKind::Unknown),
        urls,
    }
}

fn root_kind(name: &[u8]) -> FeedKind {
    match name {
        b"urlset" => FeedKind::UrlSet,
        b"sitemapindex" => FeedKind::SitemapIndex,
        b"rss" | b"RDF" => FeedKind::Rss,
        b"feed" => FeedKind::Atom,
        _ => FeedKind::Unknown,
    }
}

/// Returns `Some` when the link element carries an `href`
///
/// The inner option is `None` for links that should not be followed
/// (`rel="self"` and other non-alternate relations).
fn link_href(e: &BytesStart<'_>) -> Option<Option<String>> {
    let href = e.try_get_attribute("href").ok().flatten()?;
    let href = href.unescape_value().ok()?.trim().to_string();

    let rel = e
        .try_get_attribute("rel")
        .ok()
        .flatten()
        .and_then(|rel| rel.unescape_value().ok().map(|v| v.to_string()));
    let followable = match rel.as_deref() {
        None | Some("alternate") => !href.is_empty(),
        _ => false,
    };

    Some(followable.then_some(href))
}

/// Finds page URLs through sitemaps and feeds
pub struct FeedDiscovery {
    executor: Arc<dyn RequestExecutor>,
    timeout: Duration,
}

impl FeedDiscovery {
    pub fn new(executor: Arc<dyn RequestExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// Probes the site of `base_url` for sitemap and feed URLs
    ///
    /// # Arguments
    ///
    /// * `base_url` - Any URL on the site; only its root is used
    /// * `hints` - Extra sitemap URLs (e.g. from robots.txt `Sitemap:` lines)
    /// * `cancel` - Stops probing when cancelled
    ///
    /// # Returns
    ///
    /// Distinct http(s) URLs listed by the documents found, in discovery order
    pub async fn discover(
        &self,
        base_url: &Url,
        hints: &[String],
        cancel: &CancellationToken,
    ) -> Vec<Url> {
        let root = site_root(base_url);
        let mut probes: Vec<Url> = FEED_PATHS
            .iter()
            .filter_map(|path| root.join(path).ok())
            .collect();
        probes.extend(hints.iter().filter_map(|hint| Url::parse(hint).ok()));

        let mut probed = HashSet::new();
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for probe in probes {
            if cancel.is_cancelled() || found.len() >= MAX_DISCOVERED_URLS {
                break;
            }
            if !probed.insert(probe.to_string()) {
                continue;
            }

            let Some(document) = self.fetch_document(&probe, cancel).await else {
                continue;
            };

            let entries = if document.kind == FeedKind::SitemapIndex {
                self.expand_index(&document, &mut probed, cancel).await
            } else {
                document.urls
            };

            let before = found.len();
            for entry in entries {
                let Ok(url) = Url::parse(&entry) else {
                    continue;
                };
                if url.scheme() != "http" && url.scheme() != "https" {
                    continue;
                }
                if found.len() < MAX_DISCOVERED_URLS && seen.insert(url.to_string()) {
                    found.push(url);
                }
            }
            tracing::debug!("{} listed {} new URL(s)", probe, found.len() - before);
        }

        found
    }

    /// Follows the child sitemaps of an index, one level deep
    async fn expand_index(
        &self,
        index: &FeedDocument,
        probed: &mut HashSet<String>,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut entries = Vec::new();

        for child in index.urls.iter().take(MAX_CHILD_SITEMAPS) {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(child_url) = Url::parse(child) else {
                continue;
            };
            if !probed.insert(child_url.to_string()) {
                continue;
            }
            if let Some(document) = self.fetch_document(&child_url, cancel).await {
                // Nested indexes are not followed further
                if document.kind != FeedKind::SitemapIndex {
                    entries.extend(document.urls);
                }
            }
        }

        entries
    }

    async fn fetch_document(&self, url: &Url, cancel: &CancellationToken) -> Option<FeedDocument> {
        match self
            .executor
            .send(FetchRequest::get(url.clone(), self.timeout), cancel)
            .await
        {
            Ok(response) if response.is_success() => {
                let document = parse_feed(&response.body);
                if document.kind == FeedKind::Unknown {
                    tracing::debug!("{} is not a sitemap or feed", url);
                    return None;
                }
                Some(document)
            }
            Ok(response) => {
                tracing::trace!("Probe {} returned HTTP {}", url, response.status);
                None
            }
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", url, e);
                None
            }
        }
    }
}
