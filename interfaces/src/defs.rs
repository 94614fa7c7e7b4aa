use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Editorial section a feed (and every article it yields) belongs to.
///
/// Registry values are matched case-insensitively; the canonical spelling is
/// the title-case form returned by [`Category::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    World,
    Politics,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
    Lifestyle,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::World,
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
        Category::Lifestyle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::World => "World",
            Category::Politics => "Politics",
            Category::Business => "Business",
            Category::Technology => "Technology",
            Category::Science => "Science",
            Category::Health => "Health",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::Lifestyle => "Lifestyle",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Restricts a run to one category, or lets every feed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => *wanted == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        trimmed.parse().map(CategoryFilter::Only)
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(category) => category.fmt(f),
        }
    }
}

/// A configured RSS/Atom source. The url is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub category: Category,
    pub active: bool,
}

/// A parsed feed item before content resolution and enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateArticle {
    pub title: String,
    /// Canonical link; the dedup key.
    pub url: String,
    pub raw_summary: Option<String>,
    pub raw_content: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub category: Category,
    pub subcategory: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentOutcome {
    Ai,
    Fallback,
}

/// The values actually written to the store for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub article: CandidateArticle,
    pub summary: String,
    pub content: String,
    pub image_url: Option<String>,
    pub outcome: EnrichmentOutcome,
}

/// Row shape of the `articles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedArticle {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub content: String,
    pub category: Category,
    pub subcategory: String,
    pub source: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Inserted,
    Updated,
    Skipped,
    Failed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Inserted => "inserted",
            ItemStatus::Updated => "updated",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub url: String,
    pub feed: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ItemResult {
    pub fn new(url: impl Into<String>, feed: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            url: url.into(),
            feed: feed.into(),
            status,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A feed that produced no candidates because it could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFailure {
    pub feed: String,
    pub url: String,
    pub reason: String,
}

/// Everything one run produced. Partial runs (deadline hit) are still valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionResult {
    pub items: Vec<ItemResult>,
    pub feed_failures: Vec<FeedFailure>,
    pub deadline_exceeded: bool,
}

impl IngestionResult {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    pub fn is_partial(&self) -> bool {
        self.deadline_exceeded
    }

    /// Results belonging to one feed, in the order they were produced.
    pub fn for_feed<'a>(&'a self, feed: &'a str) -> impl Iterator<Item = &'a ItemResult> + 'a {
        self.items.iter().filter(move |item| item.feed == feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing_ignores_case() {
        assert_eq!("Science".parse::<Category>().unwrap(), Category::Science);
        assert_eq!("science".parse::<Category>().unwrap(), Category::Science);
        assert_eq!(" SCIENCE ".parse::<Category>().unwrap(), Category::Science);
        assert!("Astrology".parse::<Category>().is_err());
    }

    #[test]
    fn category_filter_all_sentinel() {
        assert_eq!("All".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!("".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "technology".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Technology)
        );

        let science = CategoryFilter::Only(Category::Science);
        assert!(science.matches(Category::Science));
        assert!(!science.matches(Category::Sports));
        assert!(CategoryFilter::All.matches(Category::Sports));
    }

    #[test]
    fn ingestion_result_counts() {
        let result = IngestionResult {
            items: vec![
                ItemResult::new("https://a.example/1", "A", ItemStatus::Inserted),
                ItemResult::new("https://a.example/2", "A", ItemStatus::Updated),
                ItemResult::new("https://b.example/1", "B", ItemStatus::Failed).with_reason("db down"),
            ],
            feed_failures: Vec::new(),
            deadline_exceeded: false,
        };

        assert_eq!(result.count(ItemStatus::Inserted), 1);
        assert_eq!(result.count(ItemStatus::Failed), 1);
        assert_eq!(result.for_feed("A").count(), 2);
        assert!(!result.is_partial());

        let json = serde_json::to_value(&result.items[2]).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "db down");
    }
}
