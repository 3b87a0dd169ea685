//! Ripple-Crawl main entry point
//!
//! This is the command-line front-end for the ripple-crawl engine.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use ripple_crawl::config::{load_options_with_hash, validate, CrawlerOptions, ExportFormat};
use ripple_crawl::crawler::{Coordinator, ProgressChannel, ProgressEvent, ProgressSink};
use ripple_crawl::output::{exporter_for, print_summary};
use ripple_crawl::CrawlResult;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Ripple-Crawl: a polite, bounded-concurrency web crawler
///
/// Crawls breadth-first from a start URL while respecting robots.txt and
/// adapting its request rate to how each host responds.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version)]
#[command(about = "A polite, bounded-concurrency web crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "URL")]
    url: String,

    /// Path to a TOML options file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum link depth from the start URL
    #[arg(long)]
    max_depth: Option<u32>,

    /// Maximum number of pages to attempt
    #[arg(long)]
    max_pages: Option<u32>,

    /// Maximum number of fetches in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Base delay between requests to one host, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Do not fetch or honour robots.txt
    #[arg(long)]
    ignore_robots: bool,

    /// Follow links to other hosts
    #[arg(long)]
    follow_external: bool,

    /// Do not probe sitemaps and feeds for extra seeds
    #[arg(long)]
    no_feeds: bool,

    /// Write a sitemap of successful pages to this file
    #[arg(long, value_name = "FILE")]
    sitemap: Option<PathBuf>,

    /// Export every attempted page to this file
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Export format
    #[arg(long, value_enum, default_value_t = FormatArg::Sqlite)]
    format: FormatArg,

    /// Use the simplified pipeline (fixed delay, no robots.txt or feeds)
    #[arg(long)]
    simple: bool,

    /// Validate options and exit without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Sqlite,
    Markdown,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Sqlite => ExportFormat::Sqlite,
            FormatArg::Markdown => ExportFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (options, options_hash) = load_options(&cli)?;
    validate(&options).context("Invalid crawl options")?;

    if cli.dry_run {
        handle_dry_run(&cli.url, &options);
        return Ok(());
    }

    let result = handle_crawl(&cli, options, options_hash).await?;

    if !cli.quiet {
        print_summary(&result);
    }

    if let Some(path) = &cli.sitemap {
        match &result.sitemap_xml {
            Some(xml) => {
                std::fs::write(path, xml)
                    .with_context(|| format!("Failed to write sitemap to {}", path.display()))?;
                tracing::info!("Sitemap written to {}", path.display());
            }
            None => tracing::warn!("No sitemap was generated"),
        }
    }

    if result.seed_failed() {
        bail!("Start URL {} could not be crawled", result.start_url);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the options file (if any) and applies command-line overrides
fn load_options(cli: &Cli) -> anyhow::Result<(CrawlerOptions, Option<String>)> {
    let (mut options, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading options from: {}", path.display());
            let (options, hash) = load_options_with_hash(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?;
            tracing::info!("Options loaded successfully (hash: {})", hash);
            (options, Some(hash))
        }
        None => (CrawlerOptions::default(), None),
    };

    if let Some(max_depth) = cli.max_depth {
        options.max_depth = max_depth;
    }
    if let Some(max_pages) = cli.max_pages {
        options.max_pages = max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        options.max_concurrency = concurrency;
    }
    if let Some(delay_ms) = cli.delay_ms {
        options.delay_ms = delay_ms;
        options.max_delay_ms = options.max_delay_ms.max(delay_ms);
    }
    if let Some(user_agent) = &cli.user_agent {
        options.user_agent = user_agent.clone();
    }
    if cli.ignore_robots {
        options.respect_robots = false;
    }
    if cli.follow_external {
        options.follow_external = true;
    }
    if cli.no_feeds {
        options.discover_feeds = false;
    }
    if cli.sitemap.is_some() {
        options.generate_sitemap = true;
    }
    if let Some(path) = &cli.export {
        options = options.with_export(path, cli.format.into());
    }

    Ok((options, hash))
}

/// Handles the --dry-run mode: shows the effective options
fn handle_dry_run(url: &str, options: &CrawlerOptions) {
    println!("=== Ripple-Crawl Dry Run ===\n");

    println!("Start URL: {}\n", url);
    println!("Crawl Options:");
    println!("  Max depth: {}", options.max_depth);
    println!("  Max pages: {}", options.max_pages);
    println!("  Max concurrency: {}", options.max_concurrency);
    println!(
        "  Delay: {}ms (adaptive up to {}ms: {})",
        options.delay_ms, options.max_delay_ms, options.adaptive_rate_limit
    );
    println!("  Timeout: {}ms", options.timeout_ms);
    println!("  User agent: {}", options.user_agent);
    println!("  Respect robots.txt: {}", options.respect_robots);
    println!("  Follow external links: {}", options.follow_external);
    println!("  Discover feeds: {}", options.discover_feeds);

    if options.export.enabled {
        if let Some(path) = &options.export.path {
            println!("\nExport: {:?} -> {}", options.export.format, path.display());
        }
    }

    println!("\nOptions are valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    cli: &Cli,
    options: CrawlerOptions,
    options_hash: Option<String>,
) -> anyhow::Result<CrawlResult> {
    let export = options.export.clone();
    let mut coordinator = if cli.simple {
        Coordinator::simplified(options)?
    } else {
        Coordinator::full(options)?
    };
    if export.enabled && options_hash.is_some() {
        coordinator = coordinator.with_exporter(exporter_for(export.format, options_hash));
    }

    // Ctrl-C stops claiming new URLs; in-flight fetches finish
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; finishing in-flight requests");
                cancel.cancel();
            }
        });
    }

    let (channel, mut events) = ProgressChannel::new(256);
    let channel = channel.with_final_timeout(Duration::from_secs(2));
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::Progress(progress) => tracing::info!(
                    "[{:>5.1}%] {} visited, ~{} remaining: {}",
                    progress.percent_complete,
                    progress.pages_visited,
                    progress.pages_remaining,
                    progress.current_url
                ),
                ProgressEvent::Error(message) => tracing::error!("{}", message),
                ProgressEvent::Complete(_) => break,
            }
        }
    });

    let sink: Arc<dyn ProgressSink> = Arc::new(channel);
    let result = coordinator
        .crawl(&cli.url, Some(Arc::clone(&sink)), cancel)
        .await
        .context("Crawl failed")?;

    // Closing the last sender ends the reporter if completion was dropped
    drop(sink);
    if tokio::time::timeout(Duration::from_secs(3), reporter)
        .await
        .is_err()
    {
        tracing::debug!("Progress reporter did not finish in time");
    }

    Ok(result)
}
