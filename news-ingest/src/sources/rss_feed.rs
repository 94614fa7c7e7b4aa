use crate::traits::FeedFetcher;
use crate::types::{CandidateArticle, FeedError, FeedSource};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Fetches feeds over HTTP and parses them with [`FeedParser`].
pub struct RssFeedFetcher {
    fetcher: Arc<Fetcher>,
}

impl RssFeedFetcher {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Upper bound for one feed including retries and backoff sleeps.
    fn overall_timeout(&self) -> Duration {
        let config = self.fetcher.config();
        let attempts = u64::from(config.max_retries) + 1;
        let backoff_budget = config.retry_delay_seconds * 16 * u64::from(config.max_retries);
        Duration::from_secs(config.timeout_seconds * attempts + backoff_budget)
    }
}

#[async_trait]
impl FeedFetcher for RssFeedFetcher {
    #[instrument(level = "info", skip_all, fields(feed = %source.name))]
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<CandidateArticle>, FeedError> {
        let budget = self.overall_timeout();
        let content = tokio::time::timeout(budget, self.fetcher.fetch_feed(&source.url))
            .await
            .map_err(|_| FeedError::Timeout {
                seconds: budget.as_secs(),
            })??;

        if !FeedParser::is_valid_feed_content(&content) {
            warn!(url = %source.url, "Response does not look like a feed; parsing anyway");
        }

        let candidates = FeedParser::parse_feed(&content, source, Utc::now())?;
        info!(url = %source.url, count = candidates.len(), "Pulled candidates from feed");
        Ok(candidates)
    }
}
