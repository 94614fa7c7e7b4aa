use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use news_ingest::{Category, CategoryFilter, IngestionResult, ItemLimit, ItemStatus, NewsAggregator, PipelineConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pull articles from the registered RSS/Atom feeds, enrich them and store them.
#[derive(Parser, Debug)]
#[command(name = "news-ingest", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion pass over the active feeds
    Run {
        /// Items per feed; negative means no limit
        #[arg(long, env = "INGEST_LIMIT", default_value_t = -1, allow_hyphen_values = true)]
        limit: i64,

        /// Only feeds of this category ("All" for every feed)
        #[arg(long, env = "INGEST_CATEGORY", default_value = "All")]
        category: CategoryFilter,

        /// Print the full run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply database migrations
    Migrate,
    /// Register a feed, or update and reactivate it if the url is known
    AddFeed {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        category: Category,
    },
    /// Stop polling a feed
    DeactivateFeed {
        #[arg(long)]
        url: String,
    },
    /// List registered feeds
    ListFeeds {
        #[arg(long, default_value = "All")]
        category: CategoryFilter,
    },
    /// Show a stored article
    ShowArticle {
        #[arg(long)]
        url: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Invalid configuration")?;
    let aggregator = NewsAggregator::from_config(&config)
        .await
        .context("Failed to initialize news aggregator")?;

    match cli.command {
        Command::Run { limit, category, json } => {
            let result = aggregator.run(ItemLimit::from(limit), category).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
        }
        Command::Migrate => aggregator.migrate().await?,
        Command::AddFeed { name, url, category } => {
            let id = aggregator.add_feed(&name, &url, category).await?;
            println!("{} ({})", id, url);
        }
        Command::DeactivateFeed { url } => {
            if !aggregator.deactivate_feed(&url).await? {
                error!(url = %url, "Feed not found");
                std::process::exit(1);
            }
        }
        Command::ListFeeds { category } => {
            for feed in aggregator.list_feeds(&category).await? {
                let state = if feed.active { "active" } else { "inactive" };
                println!("{:<14} {:<8} {:<30} {}", feed.category, state, feed.name, feed.url);
            }
        }
        Command::ShowArticle { url } => match aggregator.find_article(&url).await? {
            Some(article) => println!("{}", serde_json::to_string_pretty(&article)?),
            None => {
                error!(url = %url, "Article not found");
                std::process::exit(1);
            }
        },
    }

    info!("Done");
    Ok(())
}

fn print_report(result: &IngestionResult) {
    println!(
        "inserted: {}  updated: {}  skipped: {}  failed: {}  feed failures: {}{}",
        result.count(ItemStatus::Inserted),
        result.count(ItemStatus::Updated),
        result.count(ItemStatus::Skipped),
        result.count(ItemStatus::Failed),
        result.feed_failures.len(),
        if result.is_partial() { "  (partial: deadline reached)" } else { "" }
    );

    for failure in &result.feed_failures {
        println!("feed failed  {} <{}>: {}", failure.feed, failure.url, failure.reason);
    }
    for item in result
        .items
        .iter()
        .filter(|i| matches!(i.status, ItemStatus::Failed | ItemStatus::Skipped))
    {
        println!(
            "{:<8} {} [{}]: {}",
            item.status,
            item.url,
            item.feed,
            item.reason.as_deref().unwrap_or("")
        );
    }
}
