//! Ripple-Crawl: a polite, bounded-concurrency web crawler
//!
//! This crate discovers and fetches pages breadth-first from a seed URL while
//! respecting robots.txt, adapting per-host request spacing, and reporting
//! live progress to observers.
//!
//! The two layers are:
//! - [`engine`]: a generic bounded-concurrency work queue with drain semantics
//! - [`crawler`]: crawl orchestration built on top of the engine

pub mod config;
pub mod crawler;
pub mod engine;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Ripple-Crawl operations
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid start URL: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Ripple-Crawl operations
pub type Result<T> = std::result::Result<T, RippleError>;

// Re-export commonly used types
pub use config::CrawlerOptions;
pub use crawler::{
    crawl, crawl_simple, Coordinator, CrawlCounts, CrawlMode, CrawlProgress, CrawlResult,
    CrawledPage, ProgressChannel, ProgressEvent, ProgressSink, RequestExecutor,
};
pub use engine::{Next, WorkItem, WorkQueue, WorkSource};
pub use state::{HostState, PageState};
pub use url::{classify_link, extract_domain, normalize_url, LinkScope};
