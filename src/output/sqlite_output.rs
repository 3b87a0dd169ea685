//! SQLite exporter implementation
//!
//! Each export appends one run and its pages to the database, creating the
//! schema on first use.

use crate::output::traits::{ExportRow, Exporter, OutputResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema for the export database
pub const SCHEMA_SQL: &str = r#"
-- One row per exported crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exported_at TEXT NOT NULL,
    options_hash TEXT,
    page_count INTEGER NOT NULL
);

-- Every attempted page
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    state TEXT NOT NULL,
    status_code INTEGER,
    title TEXT,
    meta_description TEXT,
    response_time_ms INTEGER NOT NULL,
    fetched_at TEXT NOT NULL,
    error_message TEXT,
    link_count INTEGER NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_state ON pages(state);
"#;

/// Exports crawl rows to a SQLite database
#[derive(Debug, Clone, Default)]
pub struct SqliteExporter {
    options_hash: Option<String>,
}

impl SqliteExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the hash of the options file the crawl ran with
    pub fn with_options_hash(mut self, hash: impl Into<String>) -> Self {
        self.options_hash = Some(hash.into());
        self
    }

    fn open(path: &Path) -> OutputResult<Connection> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(conn)
    }
}

impl Exporter for SqliteExporter {
    fn export_rows(&self, rows: &[ExportRow], path: &Path) -> OutputResult<()> {
        let mut conn = Self::open(path)?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (exported_at, options_hash, page_count) VALUES (?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), self.options_hash, rows.len() as i64],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO pages (
                    run_id, url, depth, state, status_code, title, meta_description,
                    response_time_ms, fetched_at, error_message, link_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for row in rows {
                stmt.execute(params![
                    run_id,
                    row.url,
                    row.depth,
                    row.state.to_db_string(),
                    row.status_code,
                    row.title,
                    row.meta_description,
                    row.response_time_ms as i64,
                    row.fetched_at.to_rfc3339(),
                    row.error,
                    row.link_count as i64,
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!("Exported {} page(s) to {}", rows.len(), path.display());
        Ok(())
    }
}
