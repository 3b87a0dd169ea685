//! URL handling module for Ripple-Crawl
//!
//! This module provides URL normalization, host extraction, and
//! internal/external link classification.

mod domain;
mod normalize;

use ::url::Url;

pub use domain::{extract_domain, host_key, site_root};
pub use normalize::{normalize_parsed, normalize_url};

/// Where a discovered link points relative to the crawl's start host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkScope {
    /// Same site as the start URL (a leading `www.` is ignored)
    Internal,
    /// Any other host
    External,
}

impl LinkScope {
    /// Returns true if the link stays on the start site
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// Classifies a link against the start URL's domain
///
/// The port is part of the comparison, so `127.0.0.1:8080` and
/// `127.0.0.1:9090` are different sites.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::{classify_link, LinkScope};
///
/// let root = Url::parse("https://example.com/").unwrap();
/// let link = Url::parse("https://www.example.com/about").unwrap();
/// assert_eq!(classify_link(&link, &root), LinkScope::Internal);
///
/// let link = Url::parse("https://other.org/").unwrap();
/// assert_eq!(classify_link(&link, &root), LinkScope::External);
/// ```
pub fn classify_link(link: &Url, root: &Url) -> LinkScope {
    let same_host = match (extract_domain(link), extract_domain(root)) {
        (Some(a), Some(b)) => domain::site_host(&a) == domain::site_host(&b),
        _ => false,
    };

    if same_host && link.port_or_known_default() == root.port_or_known_default() {
        LinkScope::Internal
    } else {
        LinkScope::External
    }
}
