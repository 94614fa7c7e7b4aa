pub mod aggregator;
pub mod config;
pub mod enrichment;
pub mod feed_manager;
pub mod fetcher;
pub mod llm_adapter;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod sources;
pub mod store;
pub mod traits;
pub mod types;
pub mod utils;

pub use types::*;
pub use aggregator::NewsAggregator;
pub use config::{AiConfig, AiProvider, PipelineConfig};
pub use enrichment::{EnrichmentEngine, EnrichmentSettings};
pub use feed_manager::FeedManager;
pub use fetcher::Fetcher;
pub use llm_adapter::{EnrichmentChain, LlmAdapter, MockLlmAdapter, OpenAiAdapter};
pub use parser::FeedParser;
pub use pipeline::{Pipeline, PipelineSettings};
pub use resolver::{ContentResolver, ContentSource, HtmlScraper, ResolvedContent};
pub use store::PgArticleStore;
pub use traits::{ArticleStore, FeedFetcher, FeedRegistry, PageScraper, UpsertOutcome, UpsertStatus};
