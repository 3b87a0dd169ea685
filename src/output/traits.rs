//! Exporter trait and associated types
//!
//! This module defines the interface export collaborators implement and the
//! flat row format they receive.

use crate::state::PageState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One attempted page, flattened for export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// The page URL
    pub url: String,

    /// Link depth from the seed
    pub depth: u32,

    /// HTTP status code, if a response arrived
    pub status_code: Option<u16>,

    /// Final state of the attempt
    pub state: PageState,

    /// Page title (if available)
    pub title: Option<String>,

    /// Meta description (if available)
    pub meta_description: Option<String>,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// When the attempt finished
    pub fetched_at: DateTime<Utc>,

    /// Error message for failed attempts
    pub error: Option<String>,

    /// Number of links found on the page
    pub link_count: usize,
}

/// Summary statistics computed from export rows
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub total_pages: u64,
    pub unique_domains: u64,
    pub total_links: u64,
    pub total_errors: u64,

    // State breakdown
    pub pages_by_state: HashMap<PageState, u64>,

    // Depth breakdown (depth -> count)
    pub depth_breakdown: HashMap<u32, u64>,

    // Domains seen, sorted
    pub domains: Vec<String>,
}

impl CrawlSummary {
    /// Creates a new empty crawl summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a summary from export rows
    pub fn from_rows(rows: &[ExportRow]) -> Self {
        let mut summary = Self::new();
        let mut domains = std::collections::BTreeSet::new();

        for row in rows {
            summary.total_pages += 1;
            summary.total_links += row.link_count as u64;
            if row.state.is_error() {
                summary.total_errors += 1;
            }
            *summary.pages_by_state.entry(row.state).or_insert(0) += 1;
            *summary.depth_breakdown.entry(row.depth).or_insert(0) += 1;

            if let Some(domain) = url::Url::parse(&row.url)
                .ok()
                .and_then(|u| crate::url::extract_domain(&u))
            {
                domains.insert(domain);
            }
        }

        summary.unique_domains = domains.len() as u64;
        summary.domains = domains.into_iter().collect();
        summary
    }

    /// Number of pages in the given state
    pub fn count(&self, state: PageState) -> u64 {
        self.pages_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.count(PageState::Processed) as f64 / self.total_pages as f64) * 100.0
    }

    /// Returns the error rate as a percentage
    pub fn error_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.total_errors as f64 / self.total_pages as f64) * 100.0
    }
}

/// Export collaborator invoked once when a crawl completes
///
/// Implementations run on a blocking thread and must be thread-safe.
pub trait Exporter: Send + Sync {
    /// Writes all rows to `path`
    ///
    /// # Arguments
    ///
    /// * `rows` - Every attempted page, successes first
    /// * `path` - Destination file
    fn export_rows(&self, rows: &[ExportRow], path: &Path) -> OutputResult<()>;
}
