//! Crawler options
//!
//! This module handles loading, parsing, and validating crawl options.
//!
//! # Example
//!
//! ```no_run
//! use ripple_crawl::config::load_options;
//! use std::path::Path;
//!
//! let options = load_options(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", options.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{CrawlerOptions, ExportFormat, ExportOptions};

pub use parser::{compute_options_hash, load_options, load_options_with_hash, parse_options};
pub use validation::validate;
