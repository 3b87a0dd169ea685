//! State module for tracking crawl progress
//!
//! This module provides state for pages and hosts during the crawl process.
//!
//! # Components
//!
//! - `PageState`: Classifies the outcome of each fetch attempt
//! - `HostState`: Tracks per-host request spacing for adaptive rate limiting

mod host_state;
mod page_state;

// Re-export main types
pub use host_state::{HostState, MIN_BACKOFF_STEP, SUCCESSES_BEFORE_DECAY};
pub use page_state::PageState;
