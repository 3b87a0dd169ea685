//! Output module for crawl reports and exports
//!
//! This module handles:
//! - Exporting attempted pages to SQLite or markdown
//! - Generating sitemap XML of successful pages
//! - Computing and printing crawl statistics

mod markdown;
mod sitemap;
mod sqlite_output;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_report, MarkdownExporter};
pub use sitemap::{generate_sitemap, SitemapEntry, MAX_SITEMAP_URLS};
pub use sqlite_output::{SqliteExporter, SCHEMA_SQL};
pub use stats::{print_summary, TimingStats};
pub use traits::{CrawlSummary, ExportRow, Exporter, OutputError, OutputResult};

use crate::config::ExportFormat;
use std::sync::Arc;

/// Builds the reference exporter for a configured format
///
/// # Arguments
///
/// * `format` - The configured export format
/// * `options_hash` - Digest of the options file, recorded where supported
pub fn exporter_for(format: ExportFormat, options_hash: Option<String>) -> Arc<dyn Exporter> {
    match format {
        ExportFormat::Sqlite => {
            let exporter = SqliteExporter::new();
            match options_hash {
                Some(hash) => Arc::new(exporter.with_options_hash(hash)),
                None => Arc::new(exporter),
            }
        }
        ExportFormat::Markdown => Arc::new(MarkdownExporter::new()),
    }
}
