use serde::{Deserialize, Serialize};

pub use interfaces::defs::{
    CandidateArticle, Category, CategoryFilter, EnrichedArticle, EnrichmentOutcome, FeedFailure,
    FeedSource, IngestionResult, ItemResult, ItemStatus, PersistedArticle,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
    /// Minimum spacing between two requests to the same host.
    pub per_host_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "news-ingest/0.1".to_string(),
            timeout_seconds: 20,
            max_retries: 2,
            retry_delay_seconds: 2,
            max_feed_size_mb: 10,
            max_redirects: 5,
            per_host_interval_ms: 1000,
        }
    }
}

/// Per-feed item cap. `-1` (any negative value) means no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemLimit {
    #[default]
    Unbounded,
    AtMost(usize),
}

impl ItemLimit {
    pub fn apply<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if let ItemLimit::AtMost(n) = *self {
            items.truncate(n);
        }
        items
    }
}

impl From<i64> for ItemLimit {
    fn from(limit: i64) -> Self {
        if limit < 0 {
            ItemLimit::Unbounded
        } else {
            ItemLimit::AtMost(limit as usize)
        }
    }
}

/// Fetch or parse failure for a whole feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    TooLarge { size_mb: usize },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Full-text scrape failure. Always absorbed by the content resolver.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("No article text found on page")]
    Empty,

    #[error("Page size exceeds limit: {size_mb}MB")]
    TooLarge { size_mb: usize },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// AI call failure. Always absorbed by the enrichment engine.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("AI enrichment disabled: no credentials configured")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider returned status {status}")]
    Status { status: u16 },

    #[error("AI provider returned an empty response")]
    EmptyResponse,

    #[error("AI call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("All {attempted} adapters failed; last error: {last}")]
    Exhausted { attempted: usize, last: String },
}

impl EnrichmentError {
    /// Disabled is an expected state rather than a fault; callers log it quieter.
    pub fn is_disabled(&self) -> bool {
        matches!(self, EnrichmentError::Disabled)
    }
}

/// Store write failure for a single article.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid article URL: {0:?}")]
    InvalidUrl(String),

    #[error("Invalid stored value: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Conditions that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed registry unavailable: {0}")]
    Registry(String),

    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_limit_means_unbounded() {
        assert_eq!(ItemLimit::from(-1), ItemLimit::Unbounded);
        assert_eq!(ItemLimit::from(-42), ItemLimit::Unbounded);
        assert_eq!(ItemLimit::from(0), ItemLimit::AtMost(0));
        assert_eq!(ItemLimit::from(3), ItemLimit::AtMost(3));
    }

    #[test]
    fn limit_truncates_in_order() {
        let items = vec![1, 2, 3, 4];
        assert_eq!(ItemLimit::AtMost(2).apply(items.clone()), vec![1, 2]);
        assert_eq!(ItemLimit::Unbounded.apply(items.clone()), items);
        assert!(ItemLimit::AtMost(0).apply(items).is_empty());
    }
}
