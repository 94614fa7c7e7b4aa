use crate::traits::PageScraper;
use crate::types::{CandidateArticle, ScrapeError};
use crate::utils::{html, text};
use crate::Fetcher;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Elements whose text is never article body.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form", "noscript", "iframe", "button",
];

/// Candidate body containers, most specific first.
const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    "[itemprop=articleBody]",
    "main",
    ".article-body",
    ".post-content",
    ".entry-content",
    "body",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// Feed text met the length threshold.
    Feed,
    /// Feed text was too short and the page scrape produced something longer.
    Scraped,
    /// Feed text was too short and the scrape failed; the short text is kept.
    FallbackShort,
}

#[derive(Debug, Clone)]
pub struct ResolvedContent {
    pub text: String,
    pub source: ContentSource,
}

/// Decides whether feed text is enough to display, scraping the article page when it is not.
pub struct ContentResolver {
    scraper: Arc<dyn PageScraper>,
    min_content_length: usize,
    scrape_timeout: Duration,
}

impl ContentResolver {
    pub fn new(scraper: Arc<dyn PageScraper>, min_content_length: usize, scrape_timeout: Duration) -> Self {
        Self {
            scraper,
            min_content_length,
            scrape_timeout,
        }
    }

    /// Text the length threshold is judged on: `raw_content`, or `raw_summary` when the feed sent no content.
    pub fn feed_text(candidate: &CandidateArticle) -> &str {
        [&candidate.raw_content, &candidate.raw_summary]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|t| !t.trim().is_empty())
            .unwrap_or("")
    }

    /// The longer of the two feed-supplied texts, kept when the page cannot be scraped.
    fn retained_text(candidate: &CandidateArticle) -> &str {
        let content = candidate.raw_content.as_deref().unwrap_or("");
        let summary = candidate.raw_summary.as_deref().unwrap_or("");
        if text::char_len(summary) > text::char_len(content) {
            summary
        } else {
            content
        }
    }

    pub fn is_sufficient(&self, feed_text: &str) -> bool {
        !feed_text.trim().is_empty() && text::char_len(feed_text) >= self.min_content_length
    }

    #[instrument(level = "debug", skip_all, fields(url = %candidate.url))]
    pub async fn resolve(&self, candidate: &CandidateArticle) -> ResolvedContent {
        let feed_text = Self::feed_text(candidate);
        if self.is_sufficient(feed_text) {
            return ResolvedContent {
                text: feed_text.to_string(),
                source: ContentSource::Feed,
            };
        }

        debug!(
            chars = text::char_len(feed_text),
            min = self.min_content_length,
            "Feed text too short, scraping article page"
        );

        let retained = Self::retained_text(candidate);
        let fallback = ResolvedContent {
            text: retained.to_string(),
            source: ContentSource::FallbackShort,
        };

        match tokio::time::timeout(self.scrape_timeout, self.scraper.fetch_main_text(&candidate.url)).await {
            Ok(Ok(scraped)) if text::char_len(&scraped) > text::char_len(retained) => ResolvedContent {
                text: scraped,
                source: ContentSource::Scraped,
            },
            Ok(Ok(_)) => {
                debug!("Scraped text is not longer than feed text, keeping feed text");
                fallback
            }
            Ok(Err(e)) => {
                warn!(url = %candidate.url, error = %e, "Scrape failed, keeping feed text");
                fallback
            }
            Err(_) => {
                let e = ScrapeError::Timeout {
                    seconds: self.scrape_timeout.as_secs(),
                };
                warn!(url = %candidate.url, error = %e, "Scrape failed, keeping feed text");
                fallback
            }
        }
    }
}

/// [`PageScraper`] that downloads the page and extracts its main text.
pub struct HtmlScraper {
    fetcher: Arc<Fetcher>,
}

impl HtmlScraper {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PageScraper for HtmlScraper {
    async fn fetch_main_text(&self, url: &str) -> Result<String, ScrapeError> {
        let body = self.fetcher.fetch_page(url).await?;
        let text = extract_main_text(&body);
        if text.is_empty() {
            return Err(ScrapeError::Empty);
        }
        debug!(url = %url, chars = text::char_len(&text), "Extracted article text");
        Ok(text)
    }
}

/// Main textual body of an HTML page, paragraphs separated by blank lines.
/// Empty when nothing resembling article text is found.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraph) = Selector::parse("p") else {
        return String::new();
    };

    for raw_selector in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        let best = document
            .select(&selector)
            .filter(|container| !inside_boilerplate(*container))
            .map(|container| container_text(container, &paragraph))
            .max_by_key(|text| text.len());

        if let Some(text) = best.filter(|t| !t.is_empty()) {
            return text;
        }
    }
    String::new()
}

fn container_text(container: ElementRef<'_>, paragraph: &Selector) -> String {
    let paragraphs: Vec<String> = container
        .select(paragraph)
        .filter(|p| !inside_boilerplate(*p))
        .map(|p| text::collapse_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|p| !p.is_empty())
        .collect();

    if !paragraphs.is_empty() {
        return paragraphs.join("\n\n");
    }

    html::visible_text(container, BOILERPLATE_TAGS)
}

fn inside_boilerplate(element: ElementRef<'_>) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors())
        .filter_map(|node| node.value().as_element())
        .any(|e| BOILERPLATE_TAGS.contains(&e.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Succeed(String),
        Fail,
        Hang,
    }

    struct FakeScraper {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeScraper {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageScraper for FakeScraper {
        async fn fetch_main_text(&self, _url: &str) -> Result<String, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Succeed(text) => Ok(text.clone()),
                Behaviour::Fail => Err(ScrapeError::Status { status: 503 }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn candidate(summary: Option<&str>, content: Option<&str>) -> CandidateArticle {
        CandidateArticle {
            title: "Headline".to_string(),
            url: "https://example.com/story".to_string(),
            raw_summary: summary.map(str::to_string),
            raw_content: content.map(str::to_string),
            published_at: Utc::now(),
            source_name: "Example".to_string(),
            category: Category::World,
            subcategory: "General".to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn sufficient_feed_text_skips_scrape() {
        let scraper = FakeScraper::new(Behaviour::Succeed("scraped".to_string()));
        let resolver = ContentResolver::new(scraper.clone(), 20, Duration::from_secs(1));
        let long = "This feed item already carries a long enough body.";

        let resolved = resolver.resolve(&candidate(None, Some(long))).await;

        assert_eq!(resolved.source, ContentSource::Feed);
        assert_eq!(resolved.text, long);
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_feed_text_is_replaced_by_scrape() {
        let page = "A much longer article body that was scraped from the page itself.";
        let scraper = FakeScraper::new(Behaviour::Succeed(page.to_string()));
        let resolver = ContentResolver::new(scraper.clone(), 300, Duration::from_secs(1));

        let resolved = resolver.resolve(&candidate(Some("Teaser."), None)).await;

        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.source, ContentSource::Scraped);
        assert_eq!(resolved.text, page);
    }

    #[tokio::test]
    async fn failed_scrape_keeps_short_text() {
        let scraper = FakeScraper::new(Behaviour::Fail);
        let resolver = ContentResolver::new(scraper.clone(), 300, Duration::from_secs(1));

        let resolved = resolver.resolve(&candidate(Some("Teaser."), Some("Tiny"))).await;

        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.source, ContentSource::FallbackShort);
        assert_eq!(resolved.text, "Teaser.");
    }

    #[tokio::test]
    async fn short_content_is_judged_even_with_long_summary() {
        let scraper = FakeScraper::new(Behaviour::Fail);
        let resolver = ContentResolver::new(scraper.clone(), 300, Duration::from_secs(1));
        let summary = "x".repeat(400);

        let resolved = resolver.resolve(&candidate(Some(&summary), Some("short body"))).await;

        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.source, ContentSource::FallbackShort);
        assert_eq!(resolved.text, summary);
    }

    #[tokio::test]
    async fn summary_is_judged_when_content_is_missing() {
        let scraper = FakeScraper::new(Behaviour::Succeed("scraped".to_string()));
        let resolver = ContentResolver::new(scraper.clone(), 20, Duration::from_secs(1));
        let summary = "A summary that is long enough on its own.";

        let resolved = resolver.resolve(&candidate(Some(summary), Some("   "))).await;

        assert_eq!(scraper.calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolved.source, ContentSource::Feed);
        assert_eq!(resolved.text, summary);
    }

    #[tokio::test]
    async fn slow_scrape_times_out() {
        let scraper = FakeScraper::new(Behaviour::Hang);
        let resolver = ContentResolver::new(scraper, 300, Duration::from_millis(20));

        let resolved = resolver.resolve(&candidate(None, Some("Short body"))).await;

        assert_eq!(resolved.source, ContentSource::FallbackShort);
        assert_eq!(resolved.text, "Short body");
    }

    #[tokio::test]
    async fn empty_item_stays_empty_when_scrape_fails() {
        let resolver = ContentResolver::new(FakeScraper::new(Behaviour::Fail), 300, Duration::from_secs(1));
        let resolved = resolver.resolve(&candidate(None, None)).await;
        assert_eq!(resolved.text, "");
        assert_eq!(resolved.source, ContentSource::FallbackShort);
    }

    #[test]
    fn extracts_article_paragraphs_without_boilerplate() {
        let html = r#"<html><head><title>t</title><script>var x = 1;</script></head>
            <body>
              <header><p>Site header</p></header>
              <nav><p>Home | World | Science</p></nav>
              <article>
                <h1>Headline</h1>
                <p>First   paragraph of the story.</p>
                <aside><p>Related links</p></aside>
                <p>Second paragraph.</p>
              </article>
              <footer><p>Copyright</p></footer>
            </body></html>"#;

        assert_eq!(
            extract_main_text(html),
            "First paragraph of the story.\n\nSecond paragraph."
        );
    }

    #[test]
    fn falls_back_to_loose_text() {
        let html = "<html><body><nav>Menu</nav><div>Only <b>loose</b> text here</div></body></html>";
        assert_eq!(extract_main_text(html), "Only loose text here");
    }

    #[test]
    fn empty_page_extracts_nothing() {
        assert_eq!(extract_main_text("<html><body><nav>Menu</nav></body></html>"), "");
    }
}
