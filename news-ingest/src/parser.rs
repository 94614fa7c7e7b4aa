use crate::types::{CandidateArticle, FeedError, FeedSource};
use crate::utils::{html, text, url};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use std::collections::HashSet;
use tracing::debug;

const DEFAULT_SUBCATEGORY: &str = "General";

/// Turns a raw RSS/Atom/JSON Feed document into candidate articles.
pub struct FeedParser;

impl FeedParser {
    /// Parse `content` into candidates in document order.
    ///
    /// Entries without a usable http(s) link are dropped, as are repeats of a
    /// link already seen earlier in the same document.
    pub fn parse_feed(
        content: &str,
        source: &FeedSource,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<CandidateArticle>, FeedError> {
        let feed = parser::parse(content.as_bytes())
            .map_err(|e| FeedError::Parse(format!("Failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let mut seen_urls = HashSet::new();
        let mut candidates = Vec::with_capacity(total);

        for entry in feed.entries {
            let Some(candidate) = Self::parse_entry(entry, source, fetched_at) else {
                continue;
            };
            if !seen_urls.insert(candidate.url.clone()) {
                debug!(feed = %source.name, url = %candidate.url, "Skipping duplicate entry");
                continue;
            }
            candidates.push(candidate);
        }

        debug!(
            feed = %source.name,
            entries = total,
            candidates = candidates.len(),
            "Parsed feed"
        );
        Ok(candidates)
    }

    fn parse_entry(
        entry: Entry,
        source: &FeedSource,
        fetched_at: DateTime<Utc>,
    ) -> Option<CandidateArticle> {
        let raw_link = primary_link(&entry);
        let Some(canonical) = raw_link.as_deref().and_then(url::canonicalize) else {
            debug!(feed = %source.name, id = %entry.id, "Dropping entry without a usable link");
            return None;
        };

        let title = entry
            .title
            .as_ref()
            .map(|t| html::to_plain_text(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let raw_summary = text::non_empty(entry.summary.as_ref().map(|s| html::to_plain_text(&s.content)));
        let raw_content = text::non_empty(
            entry
                .content
                .as_ref()
                .and_then(|c| c.body.as_deref())
                .map(html::to_plain_text),
        );

        let published_at = entry.published.or(entry.updated).unwrap_or(fetched_at);

        let subcategory = entry
            .categories
            .iter()
            .map(|c| c.label.as_deref().unwrap_or(&c.term).trim())
            .find(|term| !term.is_empty())
            .unwrap_or(DEFAULT_SUBCATEGORY)
            .to_string();

        let image_url = image_link(&entry);

        Some(CandidateArticle {
            title,
            url: canonical,
            raw_summary,
            raw_content,
            published_at,
            source_name: source.name.clone(),
            category: source.category,
            subcategory,
            image_url,
        })
    }

    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();
        content_lower.contains("<rss")
            || content_lower.contains("<feed")
            || content_lower.contains("<rdf:rdf")
            || content_lower.contains("\"version\": \"https://jsonfeed.org")
    }
}

fn primary_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
}

fn image_link(entry: &Entry) -> Option<String> {
    let from_media = entry.media.iter().find_map(|media| {
        media
            .thumbnails
            .first()
            .map(|thumb| thumb.image.uri.clone())
            .or_else(|| {
                media
                    .content
                    .iter()
                    .filter(|c| {
                        c.content_type
                            .as_ref()
                            .map_or(true, |ct| ct.essence_str().starts_with("image/"))
                    })
                    .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            })
    });

    from_media
        .or_else(|| {
            entry
                .links
                .iter()
                .find(|l| {
                    l.rel.as_deref() == Some("enclosure")
                        && l.media_type.as_deref().is_some_and(|t| t.starts_with("image/"))
                })
                .map(|l| l.href.clone())
        })
        .filter(|u| url::is_valid_feed_url(u))
}
