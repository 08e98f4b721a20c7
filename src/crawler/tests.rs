use super::extract_links as extract_links_impl;
use super::is_retryable_error as is_retryable_error_impl;
use super::normalize_path_for_filtering as normalize_path_for_filtering_impl;
use super::should_crawl_url as should_crawl_url_impl;
use super::validate_url as validate_url_impl;
use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> CrawlerConfig {
    CrawlerConfig {
        rate_limit_ms: 10,
        max_retries: 0,
        timeout_seconds: 5,
        ..CrawlerConfig::default()
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

fn page(title: &str, links: &[&str]) -> String {
    let anchors = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<html><head><title>{title}</title></head><body><nav>{anchors}</nav><p>{title} body</p></body></html>"
    )
}

async fn drain(crawler: &mut WebCrawler) -> Vec<SourceRead> {
    let mut reads = Vec::new();
    while let Some(read) = crawler.next_source().await {
        reads.push(read);
    }
    reads
}

#[test]
fn validate_url() {
    assert!(validate_url_impl("https://example.com").is_ok());
    assert!(validate_url_impl("http://docs.rs/regex/1.0/").is_ok());

    assert!(validate_url_impl("ftp://example.com").is_err());
    assert!(validate_url_impl("not-a-url").is_err());
    assert!(validate_url_impl("").is_err());
    assert!(validate_url_impl("https://").is_err());
}

#[test]
fn should_crawl_url() {
    let base = Url::parse("https://docs.rs/regex/1.10.6/regex/").expect("url should parse");

    // Same path prefix
    assert!(should_crawl_url_impl(
        &Url::parse("https://docs.rs/regex/1.10.6/regex/struct.Regex.html")
            .expect("url should parse"),
        &base
    ));
    assert!(should_crawl_url_impl(&base, &base));

    // Different host
    assert!(!should_crawl_url_impl(
        &Url::parse("https://doc.rust-lang.org/std/").expect("url should parse"),
        &base
    ));

    // Different path prefix
    assert!(!should_crawl_url_impl(
        &Url::parse("https://docs.rs/other-crate/1.0/").expect("url should parse"),
        &base
    ));

    // Different scheme or port
    assert!(!should_crawl_url_impl(
        &Url::parse("http://docs.rs/regex/1.10.6/regex/").expect("url should parse"),
        &base
    ));
    assert!(!should_crawl_url_impl(
        &Url::parse("https://docs.rs:8443/regex/1.10.6/regex/").expect("url should parse"),
        &base
    ));
}

#[test]
fn normalize_path_for_filtering() {
    assert_eq!(normalize_path_for_filtering_impl("/docs/"), "/docs/");
    assert_eq!(normalize_path_for_filtering_impl("/docs"), "/docs/");
    assert_eq!(
        normalize_path_for_filtering_impl("/docs/index.html"),
        "/docs/"
    );
    assert_eq!(normalize_path_for_filtering_impl("/"), "/");
    assert_eq!(normalize_path_for_filtering_impl("docs"), "docs/");
}

#[test]
fn is_retryable_error() {
    assert!(is_retryable_error_impl(&anyhow!("Connection refused")));
    assert!(is_retryable_error_impl(&anyhow!("HTTP error 500")));
    assert!(is_retryable_error_impl(&anyhow!("HTTP error 503")));
    assert!(is_retryable_error_impl(&anyhow!("HTTP error 429")));
    assert!(is_retryable_error_impl(&anyhow!("Network unreachable")));

    assert!(!is_retryable_error_impl(&anyhow!("HTTP error 404")));
    assert!(!is_retryable_error_impl(&anyhow!("HTTP error 401")));
    assert!(!is_retryable_error_impl(&anyhow!("Invalid URL format")));
}

#[test]
fn extract_links() {
    let base_url = Url::parse("https://docs.rs/regex/1.10.6/regex/").expect("url should parse");

    let html = r##"
        <html>
            <body>
                <a href="struct.Regex.html">Regex struct</a>
                <a href="struct.Regex.html#method.new">Same page, other anchor</a>
                <a href="../../../">Root</a>
                <a href="https://docs.rs/regex/1.10.6/regex/fn.escape.html">Escape function</a>
                <a href="https://doc.rust-lang.org/std/">Std docs</a>
                <a href="mailto:test@example.com">Email</a>
                <a href="javascript:void(0)">JS link</a>
                <a href="#section">Anchor</a>
                <a>No href</a>
            </body>
        </html>
    "##;

    let links =
        extract_links_impl(html, &base_url, &base_url).expect("extract_links should succeed");

    assert_eq!(
        links,
        vec![
            Url::parse("https://docs.rs/regex/1.10.6/regex/fn.escape.html")
                .expect("url should parse"),
            Url::parse("https://docs.rs/regex/1.10.6/regex/struct.Regex.html")
                .expect("url should parse"),
        ]
    );
}

#[tokio::test]
async fn rate_limiting() {
    let config = CrawlerConfig {
        rate_limit_ms: 100,
        ..Default::default()
    };
    let mut client = HttpClient::new(config);

    let start = Instant::now();
    client.apply_rate_limit().await;
    let first_duration = start.elapsed();
    client.apply_rate_limit().await;
    let second_duration = start.elapsed();

    assert!(second_duration.as_millis() >= 100);
    assert!(first_duration.as_millis() < 50);
}

#[test]
fn config_from_partial_toml() {
    let config: CrawlerConfig = toml::from_str("max_pages = 3\n").expect("should parse");

    assert_eq!(config.max_pages, 3);
    assert_eq!(config.max_depth, 2);
    assert_eq!(config.user_agent, CrawlerConfig::default().user_agent);
}

#[tokio::test]
async fn crawls_breadth_first_within_base_path() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs/", page("Index", &["a.html", "b.html", "/other/"])).await;
    mount_page(&server, "/docs/a.html", page("A", &["c.html"])).await;
    mount_page(&server, "/docs/b.html", page("B", &["a.html"])).await;
    mount_page(&server, "/docs/c.html", page("C", &[])).await;
    mount_page(&server, "/other/", page("Other", &[])).await;

    let start = format!("{}/docs/", server.uri());
    let mut crawler = WebCrawler::new(&start, test_config()).expect("should create crawler");
    let reads = drain(&mut crawler).await;

    let documents: Vec<SourceDocument> = reads
        .into_iter()
        .map(|read| read.expect("every page should load"))
        .collect();
    let ids: Vec<String> = documents
        .iter()
        .map(|d| d.source_id.trim_start_matches(&server.uri()).to_string())
        .collect();

    assert_eq!(
        ids,
        vec!["/docs/", "/docs/a.html", "/docs/b.html", "/docs/c.html"]
    );
    assert_eq!(documents[0].content, "Index body");
    assert!(documents.iter().all(|d| !d.source_id.contains("/other/")));
}

#[tokio::test]
async fn respects_page_and_depth_limits() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs/", page("Root", &["one.html"])).await;
    mount_page(&server, "/docs/one.html", page("One", &["two.html"])).await;
    mount_page(&server, "/docs/two.html", page("Two", &["three.html"])).await;
    mount_page(&server, "/docs/three.html", page("Three", &[])).await;
    let start = format!("{}/docs/", server.uri());

    let shallow = CrawlerConfig {
        max_depth: 1,
        ..test_config()
    };
    let mut crawler = WebCrawler::new(&start, shallow).expect("should create crawler");
    assert_eq!(drain(&mut crawler).await.len(), 2);

    let few_pages = CrawlerConfig {
        max_pages: 3,
        max_depth: 10,
        ..test_config()
    };
    let mut crawler = WebCrawler::new(&start, few_pages).expect("should create crawler");
    assert_eq!(drain(&mut crawler).await.len(), 3);
    assert_eq!(crawler.stats().successful_crawls, 3);
    assert_eq!(crawler.remaining_hint(), Some(0));
}

#[tokio::test]
async fn failed_page_is_reported_and_crawl_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs/", page("Root", &["missing.html", "ok.html"])).await;
    mount_page(&server, "/docs/ok.html", page("Ok", &[])).await;
    Mock::given(method("GET"))
        .and(path("/docs/missing.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let start = format!("{}/docs/", server.uri());
    let mut crawler = WebCrawler::new(&start, test_config()).expect("should create crawler");
    let reads = drain(&mut crawler).await;

    assert_eq!(reads.len(), 3);
    let failure = reads[1].as_ref().expect_err("missing page should fail");
    assert!(failure.source_id.ends_with("/docs/missing.html"));
    assert!(matches!(failure.error, MemoryError::Network(_)));
    assert!(reads[2].is_ok());

    let stats = crawler.stats();
    assert_eq!(stats.successful_crawls, 2);
    assert_eq!(stats.failed_crawls, 1);
    assert_eq!(stats.discovered_urls, 3);
}

#[test]
fn invalid_start_url_is_rejected() {
    assert!(WebCrawler::new("ftp://example.com/", CrawlerConfig::default()).is_err());
}
