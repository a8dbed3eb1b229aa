//! Driftnet main entry point
//!
//! Command-line interface for the crawler: run a crawl over seed URLs,
//! resume an interrupted one, query the index, or print stored statistics.

use anyhow::Context;
use clap::Parser;
use driftnet::config::{load_config_with_hash, CrawlerConfig};
use driftnet::crawler::CrawlerEngine;
use driftnet::storage::{SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Driftnet: a concurrent, polite web crawler
///
/// Crawls the web from seed URLs while respecting robots.txt and per-domain
/// rate limits, storing pages and a relevance index in SQLite.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent, polite web crawler", long_about = None)]
struct Cli {
    /// Seed URLs to start crawling from
    #[arg(value_name = "URL")]
    seeds: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resume the most recent interrupted crawl
    #[arg(long)]
    resume: bool,

    /// Maximum pages to crawl (overrides config)
    #[arg(long)]
    max_pages: Option<u64>,

    /// Number of worker tasks (overrides config)
    #[arg(long)]
    threads: Option<u32>,

    /// Comma-separated target keywords for relevance scoring
    #[arg(long, value_delimiter = ',')]
    keywords: Vec<String>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["search", "resume"])]
    stats: bool,

    /// Search the index for a query and exit
    #[arg(long, value_name = "QUERY", conflicts_with = "resume")]
    search: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Load configuration, falling back to defaults without a config file
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config_with_hash(path).context("failed to load configuration")?
        }
        None => (CrawlerConfig::default(), String::from("default")),
    };

    // Apply CLI overrides
    if let Some(max_pages) = cli.max_pages {
        config.engine.max_pages = max_pages;
    }
    if let Some(threads) = cli.threads {
        config.engine.thread_count = threads;
    }
    if !cli.keywords.is_empty() {
        config.index.keywords = cli.keywords.clone();
    }

    if cli.stats {
        return handle_stats(&config);
    }

    if let Some(query) = &cli.search {
        return handle_search(&config, query);
    }

    handle_crawl(config, &config_hash, cli.seeds, cli.resume).await
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs the main crawl operation
async fn handle_crawl(
    config: CrawlerConfig,
    config_hash: &str,
    seeds: Vec<String>,
    resume: bool,
) -> anyhow::Result<()> {
    let storage =
        SqliteStorage::new(Path::new(&config.output.database_path)).context("opening database")?;
    let engine = CrawlerEngine::new(config, Box::new(storage)).context("building engine")?;

    let mut resumed = false;
    if resume {
        match engine.with_storage(|s| s.latest_active_state())? {
            Some(state) => {
                if state.config_hash != config_hash {
                    tracing::warn!(
                        "Saved state was created with a different configuration (hash {} != {})",
                        state.config_hash,
                        config_hash
                    );
                }
                engine.resume_from(&state.snapshot);
                engine.complete_state(state.id)?;
                resumed = true;
            }
            None => tracing::warn!("No saved state found, starting fresh"),
        }
    }

    if seeds.is_empty() && !resumed {
        anyhow::bail!("No seed URLs provided. Pass URLs or use --resume.");
    }

    engine.start(&seeds);
    tracing::info!("Crawl started with {} seed URLs", seeds.len());

    tokio::select! {
        _ = engine.await_completion() => {
            // Second scoring pass: provisional scores used a partial corpus
            match engine.rescore_all() {
                Ok(count) => tracing::info!("Rescored {} pages against full corpus", count),
                Err(e) => tracing::error!("Rescoring failed: {}", e),
            }

            println!("\n{}", engine.metrics());
            print_top_pages(&engine);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping crawler...");
            engine.stop().await;

            // Keep the state active so --resume can pick it up
            match engine.save_state(config_hash) {
                Ok(id) => tracing::info!("Saved crawl state (id={}) for resumption", id),
                Err(e) => tracing::error!("Failed to save crawl state: {}", e),
            }

            println!("\n{}", engine.metrics());
        }
    }

    Ok(())
}

/// Prints the highest-scored pages after a completed crawl
fn print_top_pages(engine: &CrawlerEngine) {
    let top = match engine.with_storage(|s| s.top_by_relevance(10)) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::error!("Failed to load top pages: {}", e);
            return;
        }
    };

    if top.is_empty() {
        return;
    }

    println!("\nTop pages by relevance:");
    for page in top {
        println!(
            "  {:.3}  {}  {}",
            page.relevance_score,
            page.url,
            page.title.as_deref().unwrap_or("(no title)")
        );
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &CrawlerConfig) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("opening database")?;

    println!("Database: {}\n", config.output.database_path);
    println!("Pages stored:    {}", storage.count_pages()?);
    println!("Unique domains:  {}", storage.count_unique_domains()?);

    let top = storage.top_by_relevance(10)?;
    if !top.is_empty() {
        println!("\nTop pages by relevance:");
        for page in top {
            println!(
                "  {:.3}  {}  {}",
                page.relevance_score,
                page.url,
                page.title.as_deref().unwrap_or("(no title)")
            );
        }
    }

    Ok(())
}

/// Handles the --search mode: queries the stored index
fn handle_search(config: &CrawlerConfig, query: &str) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("opening database")?;
    let indexer = driftnet::index::ContentIndexer::new();

    let results = indexer.search(&storage, query, 10)?;

    if results.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Results for: {}\n", query);
    for (url, score) in results {
        println!("  {:.4}  {}", score, url);
    }

    Ok(())
}
