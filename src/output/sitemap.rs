//! Sitemap generation
//!
//! Renders the successfully crawled pages of a run as a sitemaps.org
//! `<urlset>` document.

use crate::output::traits::{OutputError, OutputResult};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Protocol limit on URLs per sitemap file
pub const MAX_SITEMAP_URLS: usize = 50_000;

/// One `<url>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// Builds sitemap XML from entries, in the order given
///
/// Entries past [`MAX_SITEMAP_URLS`] are dropped with a warning.
pub fn generate_sitemap(entries: &[SitemapEntry]) -> OutputResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    if entries.len() > MAX_SITEMAP_URLS {
        tracing::warn!(
            "Sitemap truncated to {} of {} URL(s)",
            MAX_SITEMAP_URLS,
            entries.len()
        );
    }

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    write(&mut writer, Event::Start(urlset))?;

    for entry in entries.iter().take(MAX_SITEMAP_URLS) {
        write(&mut writer, Event::Start(BytesStart::new("url")))?;
        text_element(&mut writer, "loc", &entry.loc)?;
        if let Some(lastmod) = entry.lastmod {
            text_element(&mut writer, "lastmod", &lastmod.format("%Y-%m-%d").to_string())?;
        }
        write(&mut writer, Event::End(BytesEnd::new("url")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("urlset")))?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| OutputError::Format(e.to_string()))
}

fn text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> OutputResult<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> OutputResult<()> {
    writer
        .write_event(event)
        .map_err(|e| OutputError::Format(e.to_string()))
}
