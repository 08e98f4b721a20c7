#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Crawl a mocked site into an index and query it

use memory_index::crawler::{CrawlerConfig, WebCrawler};
use memory_index::embeddings::{ChunkingConfig, HashEmbedder};
use memory_index::indexer::{IndexManager, ingest_from};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn crawler_config(max_pages: usize) -> CrawlerConfig {
    CrawlerConfig {
        rate_limit_ms: 10,
        max_retries: 0,
        timeout_seconds: 5,
        max_pages,
        max_depth: 2,
        ..CrawlerConfig::default()
    }
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/guide/",
        r#"<html><head><title>Guide</title></head><body>
            <nav><a href="install.html">Install</a> <a href="usage.html">Usage</a>
            <a href="/elsewhere/page.html">Elsewhere</a></nav>
            <p>Welcome to the guide overview page</p></body></html>"#,
    )
    .await;
    mount_html(
        &server,
        "/guide/install.html",
        "<html><body><h1>Install</h1><p>Download the binary and add it to your path</p></body></html>",
    )
    .await;
    mount_html(
        &server,
        "/guide/usage.html",
        r#"<html><body><h1>Usage</h1><p>Run the search command with a query</p>
            <a href="missing.html">Broken</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/guide/missing.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn crawled_site_is_searchable() {
    init_test_tracing();
    let server = mock_site().await;
    let data_dir = TempDir::new().expect("should create temp dir");
    let mut manager = IndexManager::open(
        data_dir.path(),
        Box::new(HashEmbedder::new(64)),
        ChunkingConfig::Words {
            size: 20,
            overlap: 0,
        },
    )
    .expect("should open index");

    let start = format!("{}/guide/", server.uri());
    let mut crawler = WebCrawler::new(&start, crawler_config(10)).expect("should build crawler");
    let stats = ingest_from(&mut crawler, &mut manager)
        .await
        .expect("batch should run");

    assert_eq!(stats.ingested, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(crawler.stats().successful_crawls, 3);
    assert_eq!(crawler.stats().failed_crawls, 1);

    let sources: Vec<String> = manager
        .list_sources()
        .into_iter()
        .map(|summary| summary.source_id)
        .collect();
    assert_eq!(
        sources,
        vec![
            start.clone(),
            format!("{}/guide/install.html", server.uri()),
            format!("{}/guide/usage.html", server.uri()),
        ]
    );
    assert!(sources.iter().all(|source| !source.contains("elsewhere")));

    let hits = manager
        .search("download the binary", 1)
        .expect("search should succeed");
    assert_eq!(hits[0].record.source_id, format!("{}/guide/install.html", server.uri()));
}

#[tokio::test]
async fn recrawl_skips_unchanged_pages() {
    init_test_tracing();
    let server = mock_site().await;
    let data_dir = TempDir::new().expect("should create temp dir");
    let mut manager = IndexManager::open(
        data_dir.path(),
        Box::new(HashEmbedder::new(64)),
        ChunkingConfig::default(),
    )
    .expect("should open index");
    let start = format!("{}/guide/", server.uri());

    let mut first = WebCrawler::new(&start, crawler_config(2)).expect("should build crawler");
    let first_stats = ingest_from(&mut first, &mut manager)
        .await
        .expect("batch should run");
    assert_eq!(first_stats.ingested, 2);
    let chunks = manager.len();

    let mut second = WebCrawler::new(&start, crawler_config(2)).expect("should build crawler");
    let second_stats = ingest_from(&mut second, &mut manager)
        .await
        .expect("batch should run");

    assert_eq!(second_stats.skipped, 2);
    assert_eq!(second_stats.chunks_added, 0);
    assert_eq!(manager.len(), chunks);
}
