use crate::types::{FeedError, FetchConfig, ScrapeError};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff, SystemClock};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Shared HTTP client for feed documents and article pages.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    /// Next instant a request to each host may start.
    rate_limiter: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Download a feed document, retrying transient failures with exponential backoff.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_feed(&self, url: &str) -> Result<String, FeedError> {
        let start_time = Instant::now();

        let mut backoff: ExponentialBackoff<SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 16),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.fetch_feed_once(url).await {
                Ok(body) => {
                    info!(
                        url = %url,
                        bytes = body.len(),
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Fetched feed"
                    );
                    return Ok(body);
                }
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!(url = %url, attempt, ?delay, error = %e, "Feed fetch failed, retrying");
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_feed_once(&self, url: &str) -> Result<String, FeedError> {
        self.apply_rate_limit(url).await?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status { status: status.as_u16() });
        }

        let limit_bytes = self.limit_bytes();
        if let Some(size_mb) = response.content_length().and_then(|len| oversized_mb(len as usize, limit_bytes)) {
            return Err(FeedError::TooLarge { size_mb });
        }

        let body = response.text().await?;
        if let Some(size_mb) = oversized_mb(body.len(), limit_bytes) {
            return Err(FeedError::TooLarge { size_mb });
        }
        Ok(body)
    }

    /// Download an article page for full-text extraction. No retries: scraping is best-effort.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        self.apply_rate_limit(url).await?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status { status: status.as_u16() });
        }

        let limit_bytes = self.limit_bytes();
        if let Some(size_mb) = response.content_length().and_then(|len| oversized_mb(len as usize, limit_bytes)) {
            return Err(ScrapeError::TooLarge { size_mb });
        }

        let body = response.text().await?;
        if let Some(size_mb) = oversized_mb(body.len(), limit_bytes) {
            return Err(ScrapeError::TooLarge { size_mb });
        }
        debug!(url = %url, bytes = body.len(), "Fetched article page");
        Ok(body)
    }

    fn limit_bytes(&self) -> usize {
        self.config.max_feed_size_mb * 1024 * 1024
    }

    async fn apply_rate_limit(&self, url: &str) -> Result<(), url::ParseError> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.per_host_interval_ms);

        let wait_time = {
            let mut rate_limiter = self.rate_limiter.lock().await;
            let now = Instant::now();
            let slot = match rate_limiter.get(&host) {
                Some(next_allowed) if *next_allowed > now => *next_allowed,
                _ => now,
            };
            rate_limiter.insert(host.clone(), slot + min_interval);
            slot - now
        };

        if !wait_time.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", host, wait_time);
            tokio::time::sleep(wait_time).await;
        }
        Ok(())
    }
}

/// Size in MB when `len` is over the limit.
fn oversized_mb(len: usize, limit_bytes: usize) -> Option<usize> {
    (len > limit_bytes).then(|| len / (1024 * 1024))
}

fn is_retryable(error: &FeedError) -> bool {
    match error {
        FeedError::Http(e) => !e.is_builder() && !e.is_redirect(),
        FeedError::Status { status } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}
