//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, from the first fetch to the JSON file
//! left in the output directory.

use std::path::Path;
use std::time::Duration;
use sumi_harvest::config::{parse_config, Config};
use sumi_harvest::crawler::run_crawl;
use sumi_harvest::output::SilentRenderer;
use sumi_harvest::state::{CrawlState, FieldValue};
use sumi_harvest::HarvestError;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const EMPTY_PAGE: &str = "<html><body>No listings match your search</body></html>";

/// Matches requests by their `page` query parameter; `None` means page 1
struct PageParam(Option<u32>);

impl Match for PageParam {
    fn matches(&self, request: &Request) -> bool {
        let page = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned());
        page == self.0.map(|p| p.to_string())
    }
}

/// Builds a JSON listing body
fn listing(entries: &[(&str, &str)]) -> String {
    let records: Vec<serde_json::Value> = entries
        .iter()
        .map(|(title, price)| serde_json::json!({ "title": title, "price": price }))
        .collect();
    serde_json::Value::Array(records).to_string()
}

/// Creates a test configuration for a listing at `base_url`
fn create_test_config(base_url: &str, output_dir: &Path, extra: &str) -> Config {
    let toml = format!(
        r#"
[target]
base-url = "{base_url}"
required-fields = ["title", "price"]
no-results-markers = ["No listings match"]

[crawler]
multi-page = true
max-pages = 5
page-delay-ms = 10
fetch-timeout-ms = 2000

[retry]
max-retries = 2
initial-delay-ms = 10

[rate-limit]
calls = 100
period-ms = 1000

[output]
directory = '{dir}'
file-prefix = "listing"
timestamp = false

{extra}
"#,
        base_url = base_url,
        dir = output_dir.display(),
        extra = extra,
    );
    parse_config(&toml).expect("test config should be valid")
}

async fn mount_page(server: &MockServer, page: Option<u32>, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(PageParam(page))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Reads the records written by the JSON writer
fn read_output(dir: &Path) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(dir.join("listing.json")).expect("output file missing");
    serde_json::from_str(&content).expect("output is not a JSON array")
}

#[tokio::test]
async fn test_full_crawl_until_no_results_marker() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    // Each page with items is requested twice: marker check, then extraction
    mount_page(
        &server,
        None,
        listing(&[("Widget", "$10"), ("Gadget", "$20")]),
        2,
    )
    .await;
    mount_page(&server, Some(2), listing(&[("Gizmo", "$30")]), 2).await;
    mount_page(&server, Some(3), EMPTY_PAGE.to_string(), 1).await;
    mount_page(&server, Some(4), listing(&[("Never", "$0")]), 0).await;

    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), "");
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .expect("crawl should succeed");

    assert_eq!(report.termination, CrawlState::NoResults(3));
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.stats.valid_items, 3);
    assert_eq!(report.written, vec![output.path().join("listing.json")]);

    let records = read_output(output.path());
    let titles: Vec<&str> = records
        .iter()
        .filter_map(|r| r["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Widget", "Gadget", "Gizmo"]);
}

#[tokio::test]
async fn test_incomplete_and_duplicate_items_are_dropped() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    let page_one = serde_json::json!([
        { "title": "Widget", "price": "$10" },
        { "title": "Gadget" },
        { "title": "Doohickey", "price": "   " },
        { "title": "Widget", "price": "$11" },
        { "price": "$5" },
    ])
    .to_string();
    mount_page(&server, None, page_one, 2).await;
    mount_page(&server, Some(2), EMPTY_PAGE.to_string(), 1).await;

    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), "");
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].get("price"), Some(&FieldValue::from("$10")));
    assert_eq!(report.stats.total_items, 5);
    assert_eq!(report.stats.valid_items, 1);
    assert_eq!(report.stats.duplicate_items, 1);
    assert_eq!(report.stats.failed_items, 3);

    let records = read_output(output.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "Widget");
}

#[tokio::test]
async fn test_page_of_duplicates_stops_crawl() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    let body = listing(&[("Widget", "$10"), ("Gadget", "$20")]);
    mount_page(&server, None, body.clone(), 2).await;
    mount_page(&server, Some(2), body, 2).await;
    mount_page(&server, Some(3), listing(&[("Never", "$0")]), 0).await;

    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), "");
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.termination, CrawlState::NoNewItems(2));
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.stats.duplicate_items, 2);
}

#[tokio::test]
async fn test_server_error_is_retried_then_partial_results_saved() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, None, listing(&[("Widget", "$10")]), 2).await;
    // One attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(PageParam(Some(2)))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), "");
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    match &report.termination {
        CrawlState::PageFailed { page, reason } => {
            assert_eq!(*page, 2);
            assert!(reason.contains("HTTP 500"), "unexpected reason: {}", reason);
        }
        other => panic!("expected a failed page, got {}", other),
    }
    assert_eq!(read_output(output.path()).len(), 1);
}

#[tokio::test]
async fn test_single_page_mode_fetches_one_page() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, None, listing(&[("Widget", "$10")]), 2).await;
    mount_page(&server, Some(2), listing(&[("Gadget", "$20")]), 0).await;

    let config = create_test_config(
        &format!("{}/list", server.uri()),
        output.path(),
        "",
    );
    let config = Config {
        crawler: sumi_harvest::config::CrawlerConfig {
            multi_page: false,
            ..config.crawler.clone()
        },
        ..config
    };

    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.termination, CrawlState::Done(1));
    assert_eq!(report.items.len(), 1);
}

#[tokio::test]
async fn test_empty_first_page_writes_nothing() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, None, EMPTY_PAGE.to_string(), 1).await;

    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), "");
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.termination, CrawlState::NoResults(1));
    assert!(report.items.is_empty());
    assert!(report.written.is_empty());
    assert!(!output.path().join("listing.json").exists());
}

#[tokio::test]
async fn test_dead_proxy_is_evicted_and_crawl_goes_direct() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, None, listing(&[("Widget", "$10")]), 2).await;
    mount_page(&server, Some(2), EMPTY_PAGE.to_string(), 1).await;

    let proxy = format!(
        r#"
[proxy]
addresses = ["http://127.0.0.1:9"]
test-url = "{}/ip"
timeout-ms = 500
max-fail-count = 1
probe-retries = 0
"#,
        server.uri()
    );
    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), &proxy);
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.termination, CrawlState::NoResults(2));
    assert_eq!(report.items.len(), 1);
}

#[tokio::test]
async fn test_proxy_file_is_loaded() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, None, EMPTY_PAGE.to_string(), 1).await;

    let proxy_file = output.path().join("proxies.json");
    std::fs::write(&proxy_file, r#"{"proxies": ["http://127.0.0.1:9"]}"#).unwrap();

    let proxy = format!(
        r#"
[proxy]
file = '{}'
test-url = "{}/ip"
timeout-ms = 500
max-fail-count = 1
probe-retries = 0
"#,
        proxy_file.display(),
        server.uri()
    );
    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), &proxy);
    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.termination, CrawlState::NoResults(1));
}

#[tokio::test]
async fn test_file_url_listing() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("listing_page.json");
    std::fs::write(&page, listing(&[("Widget", "$10"), ("Gadget", "$20")])).unwrap();
    let base = url::Url::from_file_path(&page).unwrap();

    let output = dir.path().join("out");
    let config = create_test_config(base.as_str(), &output, "");
    let config = Config {
        crawler: sumi_harvest::config::CrawlerConfig {
            multi_page: false,
            ..config.crawler.clone()
        },
        ..config
    };

    let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.termination, CrawlState::Done(1));
    assert_eq!(read_output(&output).len(), 2);
}

#[tokio::test]
async fn test_cancelled_crawl_flushes_partial_results() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, None, listing(&[("Widget", "$10")]), 2).await;
    mount_page(&server, Some(2), listing(&[("Gadget", "$20")]), 0).await;

    let config = create_test_config(&format!("{}/list", server.uri()), output.path(), "");
    let config = Config {
        crawler: sumi_harvest::config::CrawlerConfig {
            page_delay_ms: 30_000,
            ..config.crawler.clone()
        },
        ..config
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let result = run_crawl(&config, Box::new(SilentRenderer), &cancel).await;

    assert!(matches!(result, Err(HarvestError::Cancelled)));
    let records = read_output(output.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "Widget");
}
