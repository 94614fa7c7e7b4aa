use crate::types::{
    CandidateArticle, CategoryFilter, EnrichedArticle, FeedError, FeedSource, ItemStatus,
    PersistedArticle, PersistenceError, RunError, ScrapeError,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Source of the feeds a run should visit.
#[async_trait]
pub trait FeedRegistry: Send + Sync {
    /// Active feeds matching `filter`, in registry order.
    async fn list_active_feeds(&self, filter: &CategoryFilter) -> Result<Vec<FeedSource>, RunError>;
}

/// Retrieves one feed and turns it into candidate articles.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Candidates in feed item order; may be empty.
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<CandidateArticle>, FeedError>;
}

/// Best-effort full-text extraction from an article page.
#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn fetch_main_text(&self, url: &str) -> Result<String, ScrapeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

impl From<UpsertStatus> for ItemStatus {
    fn from(status: UpsertStatus) -> Self {
        match status {
            UpsertStatus::Inserted => ItemStatus::Inserted,
            UpsertStatus::Updated => ItemStatus::Updated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub status: UpsertStatus,
}

/// Keyed article store. The url is the conflict key.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert, or update on url conflict, as one atomic write.
    async fn upsert_article(&self, article: &EnrichedArticle) -> Result<UpsertOutcome, PersistenceError>;

    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedArticle>, PersistenceError>;
}
