//! Integration tests for the crawler
//!
//! These tests drive complete crawls either against wiremock servers through
//! the real `ReqwestExecutor`, or against an in-memory scripted executor for
//! deterministic scenarios.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use ripple_crawl::config::ExportFormat;
use ripple_crawl::crawler::{
    crawl_simple, Coordinator, CrawlMode, CrawlProgress, CrawlResult, FetchError, FetchRequest,
    FetchResponse, ProgressChannel, ProgressEvent, ProgressSink, RequestExecutor,
};
use ripple_crawl::output::SqliteExporter;
use ripple_crawl::{ConfigError, CrawlerOptions, PageState, RippleError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "https://site.test";

/// Options tuned for fast tests: no delay, short timeout
fn test_options() -> CrawlerOptions {
    CrawlerOptions::default()
        .with_delay(Duration::ZERO)
        .with_max_delay(Duration::from_millis(100))
        .with_timeout(Duration::from_secs(5))
        .with_max_concurrency(4)
        .with_user_agent("RippleTestBot/1.0")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

fn urls_of(result: &CrawlResult) -> Vec<String> {
    let mut urls: Vec<String> = result.all_pages().map(|p| p.url.to_string()).collect();
    urls.sort();
    urls
}

// ---------------------------------------------------------------------------
// Scripted executor
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Scripted {
    status: u16,
    body: String,
    content_type: &'static str,
}

/// In-memory executor: unknown URLs answer 404
#[derive(Default)]
struct ScriptedExecutor {
    routes: HashMap<String, Scripted>,
    requests: Mutex<Vec<String>>,
    sent_at: Mutex<Vec<Instant>>,
    cancel_on_first_page: Option<CancellationToken>,
}

impl ScriptedExecutor {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, path: &str, body: &str) -> Self {
        self.routes.insert(
            format!("{}{}", SITE, path),
            Scripted {
                status: 200,
                body: body.to_string(),
                content_type: "text/html; charset=utf-8",
            },
        );
        self
    }

    fn text(mut self, path: &str, status: u16, body: &str, content_type: &'static str) -> Self {
        self.routes.insert(
            format!("{}{}", SITE, path),
            Scripted {
                status,
                body: body.to_string(),
                content_type,
            },
        );
        self
    }

    fn cancel_on_first_page(mut self, cancel: CancellationToken) -> Self {
        self.cancel_on_first_page = Some(cancel);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn sent_at(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }

    fn requested(&self, path: &str) -> bool {
        let url = format!("{}{}", SITE, path);
        self.requests().contains(&url)
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn send(
        &self,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let key = request.url.to_string();
        let first = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(key.clone());
            self.sent_at.lock().unwrap().push(Instant::now());
            requests.len() == 1
        };
        if first {
            if let Some(token) = &self.cancel_on_first_page {
                token.cancel();
            }
        }

        let scripted = self.routes.get(&key).cloned().unwrap_or(Scripted {
            status: 404,
            body: "not found".to_string(),
            content_type: "text/plain",
        });

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(scripted.content_type));

        Ok(FetchResponse {
            status: scripted.status,
            body: scripted.body,
            headers,
            elapsed: Duration::from_millis(1),
            final_url: request.url,
        })
    }
}

/// Sink that remembers everything it was told
#[derive(Default)]
struct RecordingSink {
    progress: Mutex<Vec<CrawlProgress>>,
    errors: Mutex<Vec<String>>,
    completed: AtomicBool,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, progress: &CrawlProgress) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn on_complete(&self, _result: &CrawlResult) {
        self.completed.store(true, Ordering::SeqCst);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

async fn run_scripted(
    executor: Arc<ScriptedExecutor>,
    mode: CrawlMode,
    options: CrawlerOptions,
) -> CrawlResult {
    Coordinator::new(options, mode, executor)
        .crawl(&format!("{}/", SITE), None, CancellationToken::new())
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// End-to-end against wiremock
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_self_loop_depth_one_crawls_three_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
               <a href="/">Home</a><a href="/a">A</a><a href="/b">B</a>
               </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/b">B</a><a href="/c">C</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/a">A</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let options = test_options().with_max_depth(1).with_feed_discovery(false);
    let result = Coordinator::full(options)
        .unwrap()
        .crawl(&server.uri(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 3, "pages: {:?}", urls_of(&result));
    assert!(result.failed_pages.is_empty());
    assert!(!result.cancelled);
    assert!(!result.seed_failed());

    let home = result.pages.iter().find(|p| p.depth == 0).unwrap();
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.status, Some(200));
    assert!(result.pages.iter().all(|p| p.depth <= 1));
}

#[tokio::test]
async fn test_robots_disallowed_pages_are_never_fetched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /private\nAllow: /private/public\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/private/secret">S</a><a href="/private/public">P</a><a href="/open">O</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/public"))
        .respond_with(html("public"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open"))
        .respond_with(html("open"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let options = test_options().with_max_depth(2).with_feed_discovery(false);
    let result = Coordinator::full(options)
        .unwrap()
        .crawl(&server.uri(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 3, "pages: {:?}", urls_of(&result));
    assert_eq!(result.counts.robots_skipped, 1);
    assert_eq!(result.skipped_urls.len(), 1);
    assert!(result.skipped_urls[0].path().ends_with("/private/secret"));
}

#[tokio::test]
async fn test_unreachable_start_url_yields_one_failed_page() {
    // Nothing listens on port 1
    let sink = Arc::new(RecordingSink::default());
    let options = test_options().with_timeout(Duration::from_secs(2));

    let result = Coordinator::full(options)
        .unwrap()
        .crawl(
            "http://127.0.0.1:1/",
            Some(sink.clone() as Arc<dyn ProgressSink>),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.pages.is_empty());
    assert_eq!(result.failed_pages.len(), 1);
    assert!(result.seed_failed());

    let failed = &result.failed_pages[0];
    assert!(failed.error.is_some());
    assert!(failed.status.is_none());
    assert!(matches!(
        failed.state,
        PageState::Unreachable | PageState::Failed | PageState::TimedOut
    ));

    assert!(sink.completed.load(Ordering::SeqCst));
    assert!(!sink.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dead_links_are_recorded_as_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/gone">gone</a><a href="/ok">ok</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html("fine"))
        .mount(&server)
        .await;

    let options = test_options().with_max_depth(1).with_feed_discovery(false);
    let result = Coordinator::full(options)
        .unwrap()
        .crawl(&server.uri(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.failed_pages.len(), 1);
    let gone = &result.failed_pages[0];
    assert_eq!(gone.status, Some(404));
    assert_eq!(gone.state, PageState::DeadLink);
    assert!(gone.links.is_empty());
}

// ---------------------------------------------------------------------------
// Deterministic scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_max_pages_limits_attempts() {
    let links: String = (0..20)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    let executor = Arc::new(ScriptedExecutor::new().page("/", &links));

    let options = test_options()
        .with_max_pages(5)
        .with_max_depth(3)
        .with_feed_discovery(false);
    let result = run_scripted(executor, CrawlMode::Full, options).await;

    assert_eq!(result.total_attempted(), 5);
    assert_eq!(result.queue.dispatched, 5);
}

#[tokio::test]
async fn test_depth_never_exceeds_max_depth() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", r#"<a href="/1">1</a>"#)
            .page("/1", r#"<a href="/2">2</a>"#)
            .page("/2", r#"<a href="/3">3</a>"#)
            .page("/3", r#"<a href="/4">4</a>"#),
    );

    let options = test_options().with_max_depth(2).with_feed_discovery(false);
    let result = run_scripted(executor.clone(), CrawlMode::Full, options).await;

    assert_eq!(result.pages.len(), 3);
    assert!(result.all_pages().all(|p| p.depth <= 2));
    assert!(!executor.requested("/3"));
}

#[tokio::test]
async fn test_no_url_is_crawled_twice() {
    let mesh = r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>
                  <a href="/a#top">a again</a><a href="/b/">b with slash</a>
                  <a href="/c?utm_source=x">c tracked</a>"#;
    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", mesh)
            .page("/a", mesh)
            .page("/b", mesh)
            .page("/c", mesh),
    );

    let options = test_options().with_max_depth(3).with_feed_discovery(false);
    let result = run_scripted(executor.clone(), CrawlMode::Full, options).await;

    let urls = urls_of(&result);
    let unique: HashSet<_> = urls.iter().collect();
    assert_eq!(urls.len(), unique.len(), "duplicates in {:?}", urls);
    assert_eq!(result.pages.len(), 4);

    let page_requests: Vec<_> = executor
        .requests()
        .into_iter()
        .filter(|u| !u.ends_with("robots.txt"))
        .collect();
    assert_eq!(page_requests.len(), 4);
}

#[tokio::test]
async fn test_cancel_after_first_dispatch_keeps_completed_item() {
    let cancel = CancellationToken::new();
    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#)
            .page("/a", "a")
            .page("/b", "b")
            .page("/c", "c")
            .cancel_on_first_page(cancel.clone()),
    );

    let options = test_options().with_max_concurrency(1);
    let result = Coordinator::new(options, CrawlMode::Simplified, executor.clone())
        .crawl(&format!("{}/", SITE), None, cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].depth, 0);
    assert_eq!(executor.requests().len(), 1);
}

#[tokio::test]
async fn test_simplified_mode_ignores_robots_and_feeds() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .text("/robots.txt", 200, "User-agent: *\nDisallow: /\n", "text/plain")
            .page("/", r#"<a href="/a">a</a>"#)
            .page("/a", "a"),
    );

    let options = test_options().with_max_depth(1);
    let result = run_scripted(executor.clone(), CrawlMode::Simplified, options).await;

    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.counts.robots_skipped, 0);
    assert!(!executor.requested("/robots.txt"));
    assert!(!executor.requested("/sitemap.xml"));
}

#[tokio::test]
async fn test_every_request_to_a_host_is_spaced() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .text("/robots.txt", 200, "User-agent: *\nAllow: /\n", "text/plain")
            .page("/", r#"<a href="/a">a</a>"#)
            .page("/a", "a"),
    );

    let delay = Duration::from_millis(50);
    let options = test_options()
        .with_delay(delay)
        .with_max_delay(Duration::from_millis(500))
        .with_max_depth(1);
    let result = run_scripted(executor.clone(), CrawlMode::Full, options).await;
    assert_eq!(result.pages.len(), 2);

    // robots.txt, the four feed probes, then both pages
    let sent_at = executor.sent_at();
    assert_eq!(sent_at.len(), 7, "requests: {:?}", executor.requests());
    for pair in sent_at.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= delay - Duration::from_millis(5),
            "gap {:?} is shorter than the {:?} host delay",
            gap,
            delay
        );
    }
}

#[tokio::test]
async fn test_feed_urls_disallowed_by_robots_are_not_dispatched() {
    let sitemap = format!(
        "<urlset><url><loc>{site}/open</loc></url><url><loc>{site}/private/x</loc></url></urlset>",
        site = SITE
    );
    let executor = Arc::new(
        ScriptedExecutor::new()
            .text("/robots.txt", 200, "User-agent: *\nDisallow: /private\n", "text/plain")
            .text("/sitemap.xml", 200, &sitemap, "application/xml")
            .page("/", "root")
            .page("/open", "open")
            .page("/private/x", "secret"),
    );

    let options = test_options().with_max_pages(3);
    let result = run_scripted(executor.clone(), CrawlMode::Full, options).await;

    assert!(!executor.requested("/private/x"));
    assert_eq!(result.counts.feed_urls, 1);
    assert_eq!(result.counts.robots_skipped, 1);
    assert_eq!(result.queue.dispatched, 2);
    assert_eq!(result.pages.len(), 2);
}

#[tokio::test]
async fn test_external_links_not_followed_by_default() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", r#"<a href="https://elsewhere.test/x">x</a><a href="/a">a</a>"#)
            .page("/a", "a"),
    );

    let options = test_options().with_max_depth(1).with_feed_discovery(false);
    let result = run_scripted(executor.clone(), CrawlMode::Full, options).await;

    assert_eq!(result.pages.len(), 2);
    assert!(!executor
        .requests()
        .iter()
        .any(|u| u.starts_with("https://elsewhere.test")));
}

#[tokio::test]
async fn test_sitemap_urls_seed_the_crawl() {
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{site}/from-sitemap</loc></url>
          <url><loc>https://elsewhere.test/ignored</loc></url>
        </urlset>"#,
        site = SITE
    );
    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", "<p>no links</p>")
            .page("/from-sitemap", "<title>Hidden</title>")
            .text("/sitemap.xml", 200, &sitemap, "application/xml"),
    );

    let options = test_options().with_max_depth(1).with_sitemap(true);
    let result = run_scripted(executor, CrawlMode::Full, options).await;

    assert_eq!(result.counts.feed_urls, 1);
    assert_eq!(result.pages.len(), 2);

    let xml = result.sitemap_xml.as_deref().unwrap();
    assert!(xml.contains("<loc>https://site.test/from-sitemap</loc>"));
    assert!(xml.contains("<loc>https://site.test/</loc>"));
}

#[tokio::test]
async fn test_robots_sitemap_hint_is_probed() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .text(
                "/robots.txt",
                200,
                "User-agent: *\nAllow: /\nSitemap: https://site.test/maps/pages.xml\n",
                "text/plain",
            )
            .text(
                "/maps/pages.xml",
                200,
                "<urlset><url><loc>https://site.test/hinted</loc></url></urlset>",
                "application/xml",
            )
            .page("/", "root")
            .page("/hinted", "hinted"),
    );

    let result = run_scripted(executor.clone(), CrawlMode::Full, test_options()).await;

    assert!(executor.requested("/maps/pages.xml"));
    assert!(result
        .pages
        .iter()
        .any(|p| p.url.as_str() == "https://site.test/hinted"));
}

#[tokio::test]
async fn test_progress_channel_receives_events() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", r#"<a href="/a">a</a>"#)
            .page("/a", "a"),
    );
    let (channel, mut events) = ProgressChannel::new(64);
    let sink: Arc<dyn ProgressSink> = Arc::new(channel);

    let options = test_options().with_max_depth(1).with_feed_discovery(false);
    let result = Coordinator::new(options, CrawlMode::Full, executor)
        .crawl(&format!("{}/", SITE), Some(sink), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.progress_dropped, 0);

    let mut progress = Vec::new();
    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        match event {
            ProgressEvent::Progress(p) => progress.push(p),
            ProgressEvent::Complete(r) => completed = Some(r),
            ProgressEvent::Error(e) => panic!("unexpected error event: {}", e),
        }
    }

    assert_eq!(progress.len(), 2);
    assert_eq!(progress.last().unwrap().pages_visited, 2);
    assert_eq!(completed.unwrap().pages.len(), 2);
}

#[tokio::test]
async fn test_export_to_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");

    let executor = Arc::new(
        ScriptedExecutor::new()
            .page("/", r#"<a href="/a">a</a><a href="/missing">m</a>"#)
            .page("/a", "a"),
    );
    let options = test_options()
        .with_max_depth(1)
        .with_feed_discovery(false)
        .with_export(&db_path, ExportFormat::Sqlite);

    let result = Coordinator::new(options, CrawlMode::Full, executor)
        .with_exporter(Arc::new(SqliteExporter::new()))
        .crawl(&format!("{}/", SITE), None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.total_attempted(), 3);

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_export_failure_is_reported_not_fatal() {
    let executor = Arc::new(ScriptedExecutor::new().page("/", "root"));
    let sink = Arc::new(RecordingSink::default());
    let options = test_options()
        .with_feed_discovery(false)
        .with_export("/nonexistent/dir/crawl.db", ExportFormat::Sqlite);

    let result = Coordinator::new(options, CrawlMode::Full, executor)
        .with_exporter(Arc::new(SqliteExporter::new()))
        .crawl(
            &format!("{}/", SITE),
            Some(sink.clone() as Arc<dyn ProgressSink>),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 1);
    let errors = sink.errors.lock().unwrap();
    assert!(errors.iter().any(|e| e.contains("Export")));
}

#[tokio::test]
async fn test_invalid_start_url_is_config_error() {
    let executor = Arc::new(ScriptedExecutor::new());
    let coordinator = Coordinator::new(test_options(), CrawlMode::Full, executor.clone());

    for bad in ["not a url", "ftp://site.test/", ""] {
        let err = coordinator
            .crawl(bad, None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, RippleError::Config(ConfigError::InvalidUrl(_))),
            "{:?}",
            err
        );
    }
    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_options_fail_before_network() {
    let executor = Arc::new(ScriptedExecutor::new().page("/", "root"));
    let options = test_options().with_max_pages(0);

    let err = Coordinator::new(options, CrawlMode::Full, executor.clone())
        .crawl(&format!("{}/", SITE), None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RippleError::Config(ConfigError::Validation(_))));
    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn test_crawl_simple_against_wiremock() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/next">next</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("end"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;

    let options = test_options()
        .with_max_depth(1)
        .with_delay(Duration::from_millis(20));
    let result = crawl_simple(&server.uri(), options, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 2);
    assert!(result.timing.max >= result.timing.min);
    assert!(result.timing.total_duration >= Duration::from_millis(20));
}
