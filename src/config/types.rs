use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Options controlling a single crawl
///
/// This is the only externally supplied configuration. It can be loaded from a
/// TOML file (kebab-case keys, every key optional) or built in code starting
/// from [`CrawlerOptions::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerOptions {
    /// Maximum link depth from the start URL (the start URL is depth 0)
    pub max_depth: u32,

    /// Maximum number of pages attempted (successes plus failures)
    pub max_pages: u32,

    /// Maximum number of fetches in flight at once
    pub max_concurrency: usize,

    /// Base delay between requests to the same host (milliseconds)
    pub delay_ms: u64,

    /// Ceiling for the adaptive per-host delay (milliseconds)
    pub max_delay_ms: u64,

    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,

    /// User-Agent header sent with every request and matched against robots.txt
    pub user_agent: String,

    /// Whether robots.txt rules and crawl-delay are honoured
    pub respect_robots: bool,

    /// Whether links to other hosts are followed
    pub follow_external: bool,

    /// Whether per-host delays adapt to failures and throttling
    pub adaptive_rate_limit: bool,

    /// Whether sitemap/RSS/Atom resources are probed for extra seeds
    pub discover_feeds: bool,

    /// Whether a sitemap XML of successful pages is attached to the result
    pub generate_sitemap: bool,

    /// Export settings
    pub export: ExportOptions,
}

/// Export collaborator settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExportOptions {
    /// Whether rows are exported when the crawl completes
    pub enabled: bool,

    /// Destination file; required when export is enabled
    pub path: Option<PathBuf>,

    /// Output format
    pub format: ExportFormat,
}

/// Supported export formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Sqlite,
    Markdown,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 100,
            max_concurrency: 4,
            delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_ms: 10_000,
            user_agent: concat!("ripple-crawl/", env!("CARGO_PKG_VERSION")).to_string(),
            respect_robots: true,
            follow_external: false,
            adaptive_rate_limit: true,
            discover_feeds: true,
            generate_sitemap: false,
            export: ExportOptions::default(),
        }
    }
}

impl CrawlerOptions {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = max_delay.as_millis() as u64;
        self
    }

    pub fn with_adaptive_rate_limit(mut self, adaptive: bool) -> Self {
        self.adaptive_rate_limit = adaptive;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    pub fn with_follow_external(mut self, follow: bool) -> Self {
        self.follow_external = follow;
        self
    }

    pub fn with_feed_discovery(mut self, enabled: bool) -> Self {
        self.discover_feeds = enabled;
        self
    }

    pub fn with_sitemap(mut self, enabled: bool) -> Self {
        self.generate_sitemap = enabled;
        self
    }

    pub fn with_export(mut self, path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        self.export = ExportOptions {
            enabled: true,
            path: Some(path.into()),
            format,
        };
        self
    }

    /// Base delay between requests to the same host
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Ceiling for the adaptive delay
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
