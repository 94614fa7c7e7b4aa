use crate::traits::{ArticleStore, UpsertOutcome, UpsertStatus};
use crate::types::{Category, EnrichedArticle, PersistedArticle, PersistenceError};
use crate::utils::url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

/// Articles table in Postgres. The unique url constraint is the dedup guard.
pub struct PgArticleStore {
    db: PgPool,
}

impl PgArticleStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn upsert_article(&self, enriched: &EnrichedArticle) -> Result<UpsertOutcome, PersistenceError> {
        let article = &enriched.article;
        let canonical = url::canonicalize(&article.url)
            .ok_or_else(|| PersistenceError::InvalidUrl(article.url.clone()))?;

        // xmax is 0 only for a freshly inserted tuple.
        let row = sqlx::query(
            r#"
            INSERT INTO articles (
                id, title, url, summary, content, category, subcategory,
                source, image_url, published_at, views, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, NOW(), NOW())
            ON CONFLICT (url) DO UPDATE
            SET title = EXCLUDED.title,
                summary = EXCLUDED.summary,
                content = EXCLUDED.content,
                category = EXCLUDED.category,
                subcategory = EXCLUDED.subcategory,
                source = EXCLUDED.source,
                image_url = EXCLUDED.image_url,
                published_at = EXCLUDED.published_at,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&article.title)
        .bind(&canonical)
        .bind(&enriched.summary)
        .bind(&enriched.content)
        .bind(article.category.as_str())
        .bind(&article.subcategory)
        .bind(&article.source_name)
        .bind(&enriched.image_url)
        .bind(article.published_at)
        .fetch_one(&self.db)
        .await?;

        let id: Uuid = row.try_get("id")?;
        let inserted: bool = row.try_get("inserted")?;
        let status = if inserted {
            UpsertStatus::Inserted
        } else {
            UpsertStatus::Updated
        };

        debug!(url = %canonical, %id, ?status, "Upserted article");
        Ok(UpsertOutcome { id, status })
    }

    async fn find_by_url(&self, raw_url: &str) -> Result<Option<PersistedArticle>, PersistenceError> {
        let canonical =
            url::canonicalize(raw_url).ok_or_else(|| PersistenceError::InvalidUrl(raw_url.to_string()))?;

        let row = sqlx::query(
            r#"
            SELECT id, title, url, summary, content, category, subcategory, source,
                   image_url, published_at, views, created_at, updated_at
            FROM articles
            WHERE url = $1
            "#,
        )
        .bind(&canonical)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_category: String = row.try_get("category")?;
        let category: Category = raw_category
            .parse()
            .map_err(|e| PersistenceError::Corrupt(format!("{}", e)))?;

        Ok(Some(PersistedArticle {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            summary: row.try_get("summary")?,
            content: row.try_get("content")?,
            category,
            subcategory: row.try_get("subcategory")?,
            source: row.try_get("source")?,
            image_url: row.try_get("image_url")?,
            published_at: row.try_get::<DateTime<Utc>, _>("published_at")?,
            views: row.try_get("views")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }
}
