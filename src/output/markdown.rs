//! Markdown report export
//!
//! This module writes a human-readable markdown report of a crawl: overall
//! statistics, a state and depth breakdown, and a table of every page.

use crate::output::traits::{CrawlSummary, ExportRow, Exporter, OutputResult};
use crate::state::PageState;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Exports crawl rows as a markdown report
#[derive(Debug, Clone, Default)]
pub struct MarkdownExporter {
    title: Option<String>,
}

impl MarkdownExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the report heading
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Exporter for MarkdownExporter {
    fn export_rows(&self, rows: &[ExportRow], path: &Path) -> OutputResult<()> {
        let title = self.title.as_deref().unwrap_or("Crawl Report");
        let markdown = format_markdown_report(title, rows);

        let mut file = File::create(path)?;
        file.write_all(markdown.as_bytes())?;

        tracing::info!("Wrote markdown report to {}", path.display());
        Ok(())
    }
}

/// Formats export rows as a markdown report
///
/// # Arguments
///
/// * `title` - Top-level heading
/// * `rows` - Every attempted page
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_report(title: &str, rows: &[ExportRow]) -> String {
    let summary = CrawlSummary::from_rows(rows);
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", title));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Pages**: {}\n", summary.total_pages));
    md.push_str(&format!(
        "- **Unique Domains**: {}\n",
        summary.unique_domains
    ));
    md.push_str(&format!("- **Total Links**: {}\n", summary.total_links));
    md.push_str(&format!("- **Total Errors**: {}\n", summary.total_errors));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!(
        "- **Error Rate**: {:.2}%\n\n",
        summary.error_rate()
    ));

    // State breakdown, in declaration order
    md.push_str("## Pages by State\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for state in PageState::all_states() {
        let count = summary.count(state);
        if count > 0 {
            md.push_str(&format!("| {} | {} |\n", state, count));
        }
    }
    md.push('\n');

    if !summary.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        let mut depths: Vec<_> = summary.depth_breakdown.iter().collect();
        depths.sort();
        for (depth, count) in depths {
            md.push_str(&format!("- Depth {}: {} page(s)\n", depth, count));
        }
        md.push('\n');
    }

    if summary.domains.len() > 1 {
        md.push_str("## Domains\n\n");
        for domain in &summary.domains {
            md.push_str(&format!("- {}\n", domain));
        }
        md.push('\n');
    }

    md.push_str("## Pages\n\n");
    if rows.is_empty() {
        md.push_str("*No pages were attempted.*\n");
        return md;
    }

    md.push_str("| URL | Depth | Status | Time (ms) | Title |\n");
    md.push_str("|-----|-------|--------|-----------|-------|\n");
    for row in rows {
        let status = match row.status_code {
            Some(code) => code.to_string(),
            None => row.state.to_string(),
        };
        let title = row
            .title
            .as_deref()
            .or(row.error.as_deref())
            .unwrap_or("");
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.url,
            row.depth,
            status,
            row.response_time_ms,
            escape_cell(title)
        ));
    }

    md
}

/// Keeps a value from breaking the table layout
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
