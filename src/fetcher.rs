use crate::retry::RetryPolicy;
use crate::types::{FetchConfig, PipelineError, Result};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Result of fetching the feed URL. `content` is `None` when the server
/// answered 304 Not Modified for our conditional headers.
#[derive(Debug)]
pub struct FeedFetch {
    pub content: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl FeedFetch {
    pub fn not_modified(&self) -> bool {
        self.content.is_none()
    }
}

/// HTTP access for both the feed and article pages. One client, shared
/// per-host rate limiting, retry with exponential backoff.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    retry: RetryPolicy,
    rate_limiter: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_secs(config.retry_delay_seconds),
        );

        Ok(Self {
            client,
            config,
            retry,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Fetch the feed document, honoring any cached ETag / Last-Modified
    /// validators from the previous run.
    pub async fn fetch_feed(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FeedFetch> {
        debug!("Fetching feed: {}", url);
        self.apply_rate_limit(url).await?;

        let this = self;
        let response = this
            .retry
            .run(move |_attempt| async move {
                let mut request = this.client.get(url);
                if let Some(etag) = etag {
                    request = request.header("If-None-Match", etag);
                }
                if let Some(last_modified) = last_modified {
                    request = request.header("If-Modified-Since", last_modified);
                }

                let response = request.send().await.map_err(PipelineError::Http)?;
                let status = response.status();
                if status == StatusCode::NOT_MODIFIED || status.is_success() {
                    Ok(response)
                } else {
                    Err(PipelineError::General(format!(
                        "HTTP {}: {}",
                        status,
                        status.canonical_reason().unwrap_or("Unknown")
                    )))
                }
            })
            .await
            .map_err(|e| e.last_error)?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("Feed not modified: {}", url);
            return Ok(FeedFetch {
                content: None,
                etag: etag.map(|s| s.to_string()),
                last_modified: last_modified.map(|s| s.to_string()),
            });
        }

        let new_etag = header_string(&response, "etag");
        let new_last_modified = header_string(&response, "last-modified");

        let content = response.text().await?;
        info!("Fetched feed: {} ({} bytes)", url, content.len());

        Ok(FeedFetch {
            content: Some(content),
            etag: new_etag,
            last_modified: new_last_modified,
        })
    }

    /// Fetch an article page as raw HTML. Failures here are per-item: the
    /// caller logs them and moves to the next candidate.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!("Fetching page: {}", url);
        self.apply_rate_limit(url).await?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::General(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content = response.text().await?;
        Ok(content)
    }

    /// Enforce a minimum interval between requests to the same host.
    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url.host_str().unwrap_or("").to_string();

        let now = Instant::now();
        let min_interval = Duration::from_millis(self.config.min_request_interval_ms);

        let mut rate_limiter = self.rate_limiter.write().await;
        if let Some(last_request) = rate_limiter.get(&host) {
            let elapsed = now.duration_since(*last_request);
            if elapsed < min_interval {
                let wait_time = min_interval - elapsed;
                debug!("Rate limiting {}: waiting {:?}", host, wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        rate_limiter.insert(host, Instant::now());

        Ok(())
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
