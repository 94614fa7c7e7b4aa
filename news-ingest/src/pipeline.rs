use crate::enrichment::EnrichmentEngine;
use crate::resolver::ContentResolver;
use crate::traits::{ArticleStore, FeedFetcher, FeedRegistry};
use crate::types::{
    CandidateArticle, CategoryFilter, FeedFailure, FeedSource, IngestionResult, ItemLimit, ItemResult,
    ItemStatus, Result,
};
use crate::utils::{time::format_duration, url};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub feed_concurrency: usize,
    pub run_deadline: Option<Duration>,
    pub store_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            feed_concurrency: 4,
            run_deadline: Some(Duration::from_secs(280)),
            store_timeout: Duration::from_secs(30),
        }
    }
}

enum RunEvent {
    Item(ItemResult),
    FeedFailed(FeedFailure),
}

/// Drives one ingestion run across all active feeds.
pub struct Pipeline {
    registry: Arc<dyn FeedRegistry>,
    fetcher: Arc<dyn FeedFetcher>,
    resolver: Arc<ContentResolver>,
    enricher: Arc<EnrichmentEngine>,
    store: Arc<dyn ArticleStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        registry: Arc<dyn FeedRegistry>,
        fetcher: Arc<dyn FeedFetcher>,
        resolver: Arc<ContentResolver>,
        enricher: Arc<EnrichmentEngine>,
        store: Arc<dyn ArticleStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            fetcher,
            resolver,
            enricher,
            store,
            settings,
        }
    }

    /// Ingest up to `limit` items from every active feed matching `filter`.
    ///
    /// Only a registry failure aborts the run. Feed and item failures are
    /// reported in the result. When the run deadline passes, whatever finished
    /// so far is returned with `deadline_exceeded` set.
    pub async fn run(&self, limit: ItemLimit, filter: CategoryFilter) -> Result<IngestionResult> {
        let started = Instant::now();

        let feeds: Vec<FeedSource> = self
            .registry
            .list_active_feeds(&filter)
            .await?
            .into_iter()
            .filter(|feed| feed.active && filter.matches(feed.category))
            .collect();

        info!(
            feeds = feeds.len(),
            filter = %filter,
            limit = ?limit,
            concurrency = self.settings.feed_concurrency,
            "Starting ingestion run"
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let claimed = Mutex::new(HashSet::new());

        let work = stream::iter(feeds)
            .map(|feed| self.process_feed(feed, limit, &tx, &claimed))
            .buffer_unordered(self.settings.feed_concurrency.max(1))
            .collect::<Vec<()>>();

        let deadline_exceeded = match self.settings.run_deadline {
            Some(deadline) => tokio::time::timeout(deadline, work).await.is_err(),
            None => {
                work.await;
                false
            }
        };
        drop(tx);

        let mut result = IngestionResult {
            deadline_exceeded,
            ..IngestionResult::default()
        };
        while let Ok(event) = rx.try_recv() {
            match event {
                RunEvent::Item(item) => result.items.push(item),
                RunEvent::FeedFailed(failure) => result.feed_failures.push(failure),
            }
        }

        if deadline_exceeded {
            warn!(
                completed = result.items.len(),
                "Run deadline reached, returning partial results"
            );
        }
        info!(
            inserted = result.count(ItemStatus::Inserted),
            updated = result.count(ItemStatus::Updated),
            skipped = result.count(ItemStatus::Skipped),
            failed = result.count(ItemStatus::Failed),
            feed_failures = result.feed_failures.len(),
            elapsed = %format_duration(started.elapsed()),
            "Ingestion run finished"
        );
        Ok(result)
    }

    async fn process_feed(
        &self,
        feed: FeedSource,
        limit: ItemLimit,
        tx: &mpsc::UnboundedSender<RunEvent>,
        claimed: &Mutex<HashSet<String>>,
    ) {
        let candidates = match self.fetcher.fetch(&feed).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(feed = %feed.name, url = %feed.url, error = %e, "Feed failed, skipping");
                let _ = tx.send(RunEvent::FeedFailed(FeedFailure {
                    feed: feed.name.clone(),
                    url: feed.url.clone(),
                    reason: e.to_string(),
                }));
                return;
            }
        };

        let total = candidates.len();
        let candidates = limit.apply(candidates);
        debug!(feed = %feed.name, total, processing = candidates.len(), "Processing feed items");

        for candidate in candidates {
            let result = self.process_item(&feed, candidate, claimed).await;
            let _ = tx.send(RunEvent::Item(result));
        }
    }

    async fn process_item(
        &self,
        feed: &FeedSource,
        mut candidate: CandidateArticle,
        claimed: &Mutex<HashSet<String>>,
    ) -> ItemResult {
        let Some(canonical) = url::canonicalize(&candidate.url) else {
            debug!(feed = %feed.name, url = %candidate.url, "Skipping item without a usable url");
            return ItemResult::new(candidate.url, &feed.name, ItemStatus::Skipped)
                .with_reason("missing or invalid url");
        };
        candidate.url = canonical;

        if !claimed.lock().await.insert(candidate.url.clone()) {
            debug!(feed = %feed.name, url = %candidate.url, "Item already handled by another feed this run");
            return ItemResult::new(candidate.url, &feed.name, ItemStatus::Skipped)
                .with_reason("already ingested in this run");
        }

        let resolved = self.resolver.resolve(&candidate).await;
        let enriched = self.enricher.enrich(&candidate, &resolved).await;

        let reason = match tokio::time::timeout(self.settings.store_timeout, self.store.upsert_article(&enriched)).await {
            Ok(Ok(outcome)) => {
                debug!(feed = %feed.name, url = %candidate.url, id = %outcome.id, "Stored article");
                return ItemResult::new(candidate.url, &feed.name, outcome.status.into());
            }
            Ok(Err(e)) => {
                warn!(feed = %feed.name, url = %candidate.url, error = %e, "Failed to store article");
                e.to_string()
            }
            Err(_) => {
                warn!(feed = %feed.name, url = %candidate.url, "Store write timed out");
                format!(
                    "store write timed out after {}",
                    format_duration(self.settings.store_timeout)
                )
            }
        };

        // Another feed listing the same url gets its own attempt.
        claimed.lock().await.remove(&candidate.url);
        ItemResult::new(candidate.url, &feed.name, ItemStatus::Failed).with_reason(reason)
    }
}
