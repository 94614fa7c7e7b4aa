use crate::config::{redact_url, PipelineConfig};
use crate::enrichment::{EnrichmentEngine, EnrichmentSettings};
use crate::llm_adapter::EnrichmentChain;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::resolver::{ContentResolver, HtmlScraper};
use crate::sources::RssFeedFetcher;
use crate::store::PgArticleStore;
use crate::traits::ArticleStore;
use crate::types::{
    Category, CategoryFilter, FeedSource, IngestionResult, ItemLimit, PersistedArticle, PersistenceError, Result,
};
use crate::{FeedManager, Fetcher};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Production wiring: Postgres registry and store, HTTP fetcher and scraper,
/// and the AI chain described by the configuration.
pub struct NewsAggregator {
    db: PgPool,
    feed_manager: Arc<FeedManager>,
    store: Arc<PgArticleStore>,
    pipeline: Pipeline,
}

impl NewsAggregator {
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        // Nothing touches the network until the configuration is known to be valid.
        config.validate()?;

        let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
        let chain = Arc::new(EnrichmentChain::from_config(&config.ai, &config.fetch.user_agent)?);
        if chain.is_enabled() {
            info!(adapters = ?chain.adapter_names(), "AI enrichment enabled");
        } else {
            info!("AI enrichment disabled, summaries will be truncated article text");
        }

        info!(database = %redact_url(&config.database_url), "Connecting to database");
        let db = PgPoolOptions::new()
            .max_connections((config.feed_concurrency as u32 + 1).max(5))
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await?;

        let feed_manager = Arc::new(FeedManager::new(db.clone()));
        let store = Arc::new(PgArticleStore::new(db.clone()));

        let resolver = ContentResolver::new(
            Arc::new(HtmlScraper::new(fetcher.clone())),
            config.min_content_length,
            config.scrape_timeout,
        );
        let enricher = EnrichmentEngine::new(
            chain,
            EnrichmentSettings {
                summary_fallback_chars: config.summary_fallback_chars,
                polish_content: config.ai.polish_content,
                target_language: config.ai.target_language.clone(),
            },
        );

        let pipeline = Pipeline::new(
            feed_manager.clone(),
            Arc::new(RssFeedFetcher::new(fetcher)),
            Arc::new(resolver),
            Arc::new(enricher),
            store.clone(),
            PipelineSettings {
                feed_concurrency: config.feed_concurrency,
                run_deadline: config.run_deadline,
                ..PipelineSettings::default()
            },
        );

        Ok(Self {
            db,
            feed_manager,
            store,
            pipeline,
        })
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn run(&self, limit: ItemLimit, filter: CategoryFilter) -> Result<IngestionResult> {
        self.pipeline.run(limit, filter).await
    }

    pub async fn add_feed(&self, name: &str, url: &str, category: Category) -> Result<Uuid> {
        self.feed_manager.add_feed(name, url, category).await
    }

    pub async fn deactivate_feed(&self, url: &str) -> Result<bool> {
        self.feed_manager.deactivate_feed(url).await
    }

    pub async fn list_feeds(&self, filter: &CategoryFilter) -> Result<Vec<FeedSource>> {
        self.feed_manager.list_feeds(filter).await
    }

    pub async fn find_article(&self, url: &str) -> std::result::Result<Option<PersistedArticle>, PersistenceError> {
        self.store.find_by_url(url).await
    }
}
