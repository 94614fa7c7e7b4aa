// In-memory stand-ins for every pipeline boundary.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use news_ingest::{
    ArticleStore, CandidateArticle, Category, CategoryFilter, ContentResolver, EnrichedArticle, EnrichmentChain,
    EnrichmentEngine, EnrichmentError, EnrichmentSettings, FeedError, FeedFetcher, FeedRegistry, FeedSource,
    LlmAdapter, PageScraper, PersistedArticle, PersistenceError, Pipeline, PipelineSettings, RunError, ScrapeError,
    UpsertOutcome, UpsertStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn feed(name: &str, url: &str, category: Category) -> FeedSource {
    FeedSource {
        name: name.to_string(),
        url: url.to_string(),
        category,
        active: true,
    }
}

pub fn candidate(source: &FeedSource, url: &str, title: &str, content: &str) -> CandidateArticle {
    CandidateArticle {
        title: title.to_string(),
        url: url.to_string(),
        raw_summary: None,
        raw_content: Some(content.to_string()),
        published_at: Utc.with_ymd_and_hms(2025, 6, 10, 4, 0, 0).unwrap(),
        source_name: source.name.clone(),
        category: source.category,
        subcategory: "General".to_string(),
        image_url: None,
    }
}

/// Body long enough to skip the scrape step with the default threshold used here.
pub fn long_body(topic: &str) -> String {
    format!("{} ", topic).repeat(120).trim_end().to_string()
}

#[derive(Default)]
pub struct MemoryRegistry {
    pub feeds: Vec<FeedSource>,
    pub unavailable: bool,
}

#[async_trait]
impl FeedRegistry for MemoryRegistry {
    async fn list_active_feeds(&self, filter: &CategoryFilter) -> Result<Vec<FeedSource>, RunError> {
        if self.unavailable {
            return Err(RunError::Registry("connection refused".to_string()));
        }
        Ok(self
            .feeds
            .iter()
            .filter(|f| f.active && filter.matches(f.category))
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub enum FeedBehaviour {
    Items(Vec<CandidateArticle>),
    Fail(u16),
    Hang,
}

#[derive(Default)]
pub struct FakeFetcher {
    behaviours: HashMap<String, FeedBehaviour>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with(mut self, url: &str, behaviour: FeedBehaviour) -> Self {
        self.behaviours.insert(url.to_string(), behaviour);
        self
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<CandidateArticle>, FeedError> {
        self.fetched.lock().unwrap().push(source.url.clone());
        match self.behaviours.get(&source.url).cloned() {
            Some(FeedBehaviour::Items(items)) => Ok(items),
            Some(FeedBehaviour::Fail(status)) => Err(FeedError::Status { status }),
            Some(FeedBehaviour::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
            None => Err(FeedError::Parse("no such feed".to_string())),
        }
    }
}

/// Scraper that either always fails or always returns the same page text.
pub struct FakeScraper {
    pub page_text: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeScraper {
    pub fn failing() -> Self {
        Self {
            page_text: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(text: &str) -> Self {
        Self {
            page_text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageScraper for FakeScraper {
    async fn fetch_main_text(&self, _url: &str) -> Result<String, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.page_text.clone().ok_or(ScrapeError::Status { status: 403 })
    }
}

/// Every AI call fails.
pub struct ThrowingAdapter;

#[async_trait]
impl LlmAdapter for ThrowingAdapter {
    fn adapter_name(&self) -> String {
        "throwing".to_string()
    }
    async fn summarize(&self, _text: &str) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Status { status: 503 })
    }
    async fn translate(&self, _text: &str, _lang: &str) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Status { status: 503 })
    }
    async fn polish(&self, _text: &str) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Status { status: 503 })
    }
}

/// Keyed by url like the real table: insert or update, never touching views or created_at.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, PersistedArticle>>,
    pub failing_urls: HashSet<String>,
    /// Urls whose next write fails, then succeed.
    fail_next: Mutex<HashSet<String>>,
    slow_urls: HashMap<String, Duration>,
}

impl MemoryStore {
    pub fn failing_on(url: &str) -> Self {
        Self {
            failing_urls: HashSet::from([url.to_string()]),
            ..Self::default()
        }
    }

    pub fn failing_once_on(url: &str) -> Self {
        Self {
            fail_next: Mutex::new(HashSet::from([url.to_string()])),
            ..Self::default()
        }
    }

    pub fn slow_on(url: &str, delay: Duration) -> Self {
        Self {
            slow_urls: HashMap::from([(url.to_string(), delay)]),
            ..Self::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, url: &str) -> Option<PersistedArticle> {
        self.rows.lock().unwrap().get(url).cloned()
    }

    pub fn bump_views(&self, url: &str, views: i64) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(url) {
            row.views = views;
        }
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn upsert_article(&self, enriched: &EnrichedArticle) -> Result<UpsertOutcome, PersistenceError> {
        let article = &enriched.article;
        if let Some(delay) = self.slow_urls.get(&article.url) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_urls.contains(&article.url) || self.fail_next.lock().unwrap().remove(&article.url) {
            return Err(PersistenceError::Corrupt("simulated write failure".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        match rows.get_mut(&article.url) {
            Some(row) => {
                row.title = article.title.clone();
                row.summary = enriched.summary.clone();
                row.content = enriched.content.clone();
                row.category = article.category;
                row.subcategory = article.subcategory.clone();
                row.source = article.source_name.clone();
                row.image_url = enriched.image_url.clone();
                row.published_at = article.published_at;
                row.updated_at = now;
                Ok(UpsertOutcome {
                    id: row.id,
                    status: UpsertStatus::Updated,
                })
            }
            None => {
                let id = Uuid::new_v4();
                rows.insert(
                    article.url.clone(),
                    PersistedArticle {
                        id,
                        title: article.title.clone(),
                        url: article.url.clone(),
                        summary: enriched.summary.clone(),
                        content: enriched.content.clone(),
                        category: article.category,
                        subcategory: article.subcategory.clone(),
                        source: article.source_name.clone(),
                        image_url: enriched.image_url.clone(),
                        published_at: article.published_at,
                        views: 0,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(UpsertOutcome {
                    id,
                    status: UpsertStatus::Inserted,
                })
            }
        }
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedArticle>, PersistenceError> {
        Ok(self.get(url))
    }
}

pub struct Harness {
    pub registry: Arc<MemoryRegistry>,
    pub fetcher: Arc<FakeFetcher>,
    pub scraper: Arc<FakeScraper>,
    pub store: Arc<MemoryStore>,
    pub pipeline: Pipeline,
}

pub struct HarnessOptions {
    pub chain: EnrichmentChain,
    pub min_content_length: usize,
    pub summary_fallback_chars: usize,
    pub settings: PipelineSettings,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            chain: EnrichmentChain::disabled(),
            min_content_length: 100,
            summary_fallback_chars: 50,
            settings: PipelineSettings {
                feed_concurrency: 2,
                run_deadline: None,
                store_timeout: Duration::from_secs(5),
            },
        }
    }
}

pub fn harness(
    registry: MemoryRegistry,
    fetcher: FakeFetcher,
    scraper: FakeScraper,
    store: MemoryStore,
    options: HarnessOptions,
) -> Harness {
    let registry = Arc::new(registry);
    let fetcher = Arc::new(fetcher);
    let scraper = Arc::new(scraper);
    let store = Arc::new(store);

    let resolver = ContentResolver::new(scraper.clone(), options.min_content_length, Duration::from_secs(1));
    let enricher = EnrichmentEngine::new(
        Arc::new(options.chain),
        EnrichmentSettings {
            summary_fallback_chars: options.summary_fallback_chars,
            ..EnrichmentSettings::default()
        },
    );

    let pipeline = Pipeline::new(
        registry.clone(),
        fetcher.clone(),
        Arc::new(resolver),
        Arc::new(enricher),
        store.clone(),
        options.settings,
    );

    Harness {
        registry,
        fetcher,
        scraper,
        store,
        pipeline,
    }
}
