//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title
//! - Meta description
//!
//! Parsing never fails. Malformed markup degrades to whatever the HTML5
//! parser recovered, and the parser's complaints are kept as notes.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Upper bound on parse notes kept per page
const MAX_PARSE_NOTES: usize = 10;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Content of `<meta name="description">`
    pub meta_description: Option<String>,

    /// Links found on the page (absolute, fragment-free, deduplicated)
    pub links: Vec<Url>,

    /// Recoverable problems reported by the HTML parser
    pub parse_notes: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Anything that is not HTTP(S) after resolution
///
/// Relative links resolve against `<base href>` when present, otherwise
/// against `base_url`.
///
/// # Example
///
/// ```
/// use ripple_crawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let parse_notes: Vec<String> = document
        .errors
        .iter()
        .take(MAX_PARSE_NOTES)
        .map(|e| e.to_string())
        .collect();
    if !parse_notes.is_empty() {
        tracing::debug!(
            "{} parse note(s) for {}: {}",
            document.errors.len(),
            base_url,
            parse_notes.join("; ")
        );
    }

    ParsedPage {
        title: title_of(&document),
        meta_description: meta_description_of(&document),
        links: links_of(&document, base_url),
        parse_notes,
    }
}

/// Extracts all followable links from HTML
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    links_of(&Html::parse_document(html), base_url)
}

/// Extracts the trimmed page title, if non-empty
pub fn extract_title(html: &str) -> Option<String> {
    title_of(&Html::parse_document(html))
}

/// Extracts the trimmed meta description, if non-empty
pub fn extract_meta_description(html: &str) -> Option<String> {
    meta_description_of(&Html::parse_document(html))
}

fn title_of(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn meta_description_of(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name][content]").ok()?;

    document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("name")
                .map_or(false, |name| name.eq_ignore_ascii_case("description"))
        })
        .and_then(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn links_of(document: &Html, base_url: &Url) -> Vec<Url> {
    let base = document_base(document, base_url);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(url) = resolve_link(href, &base) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    };

    // Extract links from <a> tags
    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    // Extract canonical link
    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// The document's `<base href>`, resolved against the fetch URL
fn document_base(document: &Html, base_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| base_url.join(href.trim()).ok())
        })
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| base_url.clone())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    // Skip empty hrefs and fragment-only links (same page anchors)
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
