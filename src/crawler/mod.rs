pub mod extractor;

#[cfg(test)]
mod tests;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use self::extractor::extract_page;
use crate::sources::{SourceDocument, SourceFailure, SourceRead, SourceReader};
use crate::{MemoryError, Result};

/// Configuration for the web crawler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
    /// Rate limit delay between requests in milliseconds
    pub rate_limit_ms: u64,
    /// Maximum number of retry attempts for retryable errors
    pub max_retries: u32,
    /// Delay between retry attempts in seconds
    pub retry_delay_seconds: u64,
    /// Maximum number of pages fetched per crawl
    pub max_pages: usize,
    /// Maximum link depth followed from the start page
    pub max_depth: usize,
}

impl Default for CrawlerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            user_agent: "memory-index/0.1.0 (Retrieval Indexer)".to_string(),
            timeout_seconds: 30,
            rate_limit_ms: 250,
            max_retries: 2,
            retry_delay_seconds: 5,
            max_pages: 10,
            max_depth: 2,
        }
    }
}

/// HTTP client wrapper with rate limiting and retry logic
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    config: CrawlerConfig,
    last_request_time: Option<Instant>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    #[inline]
    pub fn new(config: CrawlerConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            last_request_time: None,
        }
    }

    /// Perform an HTTP GET request with rate limiting and retry logic
    #[inline]
    pub async fn get(&mut self, url: &str) -> anyhow::Result<String> {
        self.apply_rate_limit().await;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retrying request to {} (attempt {})", url, attempt + 1);
                sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            match self.try_get(url) {
                Ok(response) => {
                    debug!("Successfully fetched {} (attempt {})", url, attempt + 1);
                    return Ok(response);
                }
                Err(e) if is_retryable_error(&e) && attempt < self.config.max_retries => {
                    warn!("Retryable error for {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("Non-retryable error for {}: {}", url, e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    /// Apply rate limiting by sleeping if necessary
    async fn apply_rate_limit(&mut self) {
        if let Some(last_time) = self.last_request_time {
            let elapsed = last_time.elapsed();
            let rate_limit_duration = Duration::from_millis(self.config.rate_limit_ms);

            if elapsed < rate_limit_duration {
                let sleep_duration = rate_limit_duration - elapsed;
                debug!("Rate limiting: sleeping for {:?}", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        self.last_request_time = Some(Instant::now());
    }

    /// Attempt a single HTTP GET request without retry logic
    fn try_get(&self, url: &str) -> anyhow::Result<String> {
        debug!("Making HTTP GET request to: {}", url);

        match self.agent.get(url).call() {
            Ok(mut response) => {
                let text = response
                    .body_mut()
                    .read_to_string()
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!("Successfully read {} bytes from {}", text.len(), url);
                Ok(text)
            }
            Err(ureq::Error::StatusCode(status)) => {
                debug!("HTTP request failed with status {}: {}", status, url);
                Err(anyhow!("HTTP error {}", status))
            }
            Err(e) => {
                debug!("HTTP request failed with transport error: {}", e);
                Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to make HTTP request to {}", url))
            }
        }
    }
}

impl Default for HttpClient {
    /// Create a new HTTP client with default configuration
    #[inline]
    fn default() -> Self {
        Self::new(CrawlerConfig::default())
    }
}

/// Check if an error is retryable (network timeouts, 5xx errors, 429)
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = format!("{:#}", error).to_lowercase();

    if error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("connection")
        || error_str.contains("network")
    {
        return true;
    }

    error_str.contains("http error 5") || error_str.contains("http error 429")
}

/// Validate and normalize a URL
#[inline]
pub fn validate_url(url_str: &str) -> anyhow::Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}

/// Check if a URL stays on the base URL's host and under its path
#[inline]
pub fn should_crawl_url(url: &Url, base_url: &Url) -> bool {
    if url.scheme() != base_url.scheme()
        || url.host() != base_url.host()
        || url.port_or_known_default() != base_url.port_or_known_default()
    {
        return false;
    }

    let base_path = normalize_path_for_filtering(base_url.path());
    let url_path = url.path();

    url_path.starts_with(base_path.as_ref())
}

/// Normalize a URL path for filtering by removing trailing filename if present
fn normalize_path_for_filtering(path: &str) -> Cow<'_, str> {
    if path.ends_with('/') {
        Cow::Borrowed(path)
    } else {
        path.rfind('/').map_or_else(
            || Cow::Owned(format!("{}/", path)),
            #[expect(clippy::string_slice, reason = "we know the split point is one byte")]
            |last_slash| {
                let last_segment = &path[last_slash + 1..];
                if last_segment.contains('.') {
                    // Looks like a filename, use the directory path
                    Cow::Borrowed(&path[..=last_slash])
                } else {
                    Cow::Owned(format!("{}/", path))
                }
            },
        )
    }
}

/// Extract the crawlable links of a page, resolved and deduplicated
#[inline]
pub fn extract_links(html: &str, source_url: &Url, base_url: &Url) -> anyhow::Result<Vec<Url>> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]")
        .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;

    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.starts_with("mailto:") || href.starts_with("javascript:") || href.starts_with('#')
        {
            continue;
        }

        match source_url.join(href) {
            Ok(mut absolute_url) => {
                absolute_url.set_fragment(None);
                if should_crawl_url(&absolute_url, base_url) {
                    links.push(absolute_url);
                }
            }
            Err(e) => {
                debug!(
                    "Failed to resolve URL '{}' relative to '{}': {}",
                    href, source_url, e
                );
            }
        }
    }

    links.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    links.dedup();

    debug!("Extracted {} valid links from {}", links.len(), source_url);
    Ok(links)
}

/// Statistics about a crawl session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// URLs queued, including the start page
    pub discovered_urls: usize,
    /// Pages fetched and converted
    pub successful_crawls: usize,
    /// Pages that could not be fetched
    pub failed_crawls: usize,
}

/// Breadth-first crawler that yields each fetched page as a source.
///
/// Only pages under the start URL's host and path are followed, up to
/// `max_depth` links away and `max_pages` fetches in total. The page URL is
/// the source id.
#[derive(Debug)]
pub struct WebCrawler {
    http_client: HttpClient,
    base_url: Url,
    queue: VecDeque<(Url, usize)>,
    discovered: HashSet<String>,
    max_pages: usize,
    max_depth: usize,
    stats: CrawlStats,
}

impl WebCrawler {
    #[inline]
    pub fn new(start_url: &str, config: CrawlerConfig) -> Result<Self> {
        let mut base_url = validate_url(start_url)?;
        base_url.set_fragment(None);

        info!(
            "Crawling from {} (max {} pages, depth {})",
            base_url, config.max_pages, config.max_depth
        );

        let mut discovered = HashSet::new();
        discovered.insert(base_url.as_str().to_string());

        Ok(Self {
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            http_client: HttpClient::new(config),
            queue: VecDeque::from([(base_url.clone(), 0)]),
            base_url,
            discovered,
            stats: CrawlStats {
                discovered_urls: 1,
                ..CrawlStats::default()
            },
        })
    }

    #[inline]
    pub fn stats(&self) -> CrawlStats {
        self.stats
    }

    fn pages_attempted(&self) -> usize {
        self.stats.successful_crawls + self.stats.failed_crawls
    }

    fn enqueue_links(&mut self, html: &str, page_url: &Url, depth: usize) {
        if depth >= self.max_depth {
            return;
        }

        match extract_links(html, page_url, &self.base_url) {
            Ok(links) => {
                for link in links {
                    if self.discovered.insert(link.as_str().to_string()) {
                        self.stats.discovered_urls += 1;
                        self.queue.push_back((link, depth + 1));
                    }
                }
            }
            Err(e) => warn!("Failed to extract links from {}: {}", page_url, e),
        }
    }
}

#[async_trait]
impl SourceReader for WebCrawler {
    async fn next_source(&mut self) -> Option<SourceRead> {
        if self.pages_attempted() >= self.max_pages {
            if !self.queue.is_empty() {
                info!(
                    "Page limit of {} reached, {} queued URLs not crawled",
                    self.max_pages,
                    self.queue.len()
                );
                self.queue.clear();
            }
            return None;
        }

        let (url, depth) = self.queue.pop_front()?;
        debug!("Crawling {} at depth {}", url, depth);

        match self.http_client.get(url.as_str()).await {
            Ok(html) => {
                self.stats.successful_crawls += 1;
                self.enqueue_links(&html, &url, depth);

                let page = extract_page(&html);
                Some(Ok(SourceDocument {
                    source_id: url.to_string(),
                    content: page.text,
                    last_modified: None,
                }))
            }
            Err(e) => {
                self.stats.failed_crawls += 1;
                warn!("Failed to crawl {}: {:#}", url, e);
                Some(Err(SourceFailure {
                    source_id: url.to_string(),
                    error: MemoryError::Network(format!("{:#}", e)),
                }))
            }
        }
    }

    #[inline]
    fn remaining_hint(&self) -> Option<usize> {
        Some(
            self.queue
                .len()
                .min(self.max_pages.saturating_sub(self.pages_attempted())),
        )
    }
}
