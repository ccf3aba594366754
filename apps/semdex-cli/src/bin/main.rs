use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use semdex_core::config::{Config, Settings};
use semdex_core::types::{BuildReport, SearchResult};
use semdex_embed::get_default_embedder;
use semdex_engine::SearchEngine;

#[derive(Parser, Debug)]
#[command(name = "semdex", author, version, about = "Semantic search over a folder of text documents", long_about = None)]
struct Cli {
    /// Configuration environment (dev, prod, test); overrides RUST_ENV.
    #[arg(long, env = "RUST_ENV", default_value = "dev")]
    env: String,

    /// Debug logging unless RUST_LOG is set.
    #[arg(short, long)]
    verbose: bool,

    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load documents and (re)build the index, reusing cached embeddings.
    Index {
        /// Ignore the cache and embed every document again.
        #[arg(short, long)]
        force: bool,

        /// Delete cache entries for documents no longer present.
        #[arg(long)]
        prune: bool,
    },

    /// Rank documents against a query.
    Search {
        query: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Append configured synonyms before embedding.
        #[arg(long)]
        expand: bool,
    },

    /// Show corpus, cache and backend status.
    Status,

    /// Delete cache entries whose document is gone.
    Prune,
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

async fn open_engine(settings: &Settings, show_progress: bool) -> anyhow::Result<SearchEngine> {
    let embedder = get_default_embedder(&settings.embedding, settings.model_dir())?;
    let engine = SearchEngine::from_settings(settings, embedder)
        .await
        .with_context(|| format!("opening cache at {}", settings.cache_uri()))?;
    let mut options = semdex_engine::EngineOptions::from_settings(settings);
    options.show_progress = show_progress;
    Ok(engine.with_options(options))
}

fn print_report(report: &BuildReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Indexed {} documents", report.docs_indexed);
    println!("  cache hits:      {}", report.cache_hits);
    println!("  embedded:        {} ({} provider calls)", report.computed, report.provider_calls);
    if report.cache_write_failures > 0 {
        println!("  cache write failures: {}", report.cache_write_failures);
    }
    println!("  stale entries:   {} (pruned {})", report.stale_entries, report.pruned);
    Ok(())
}

fn print_results(query: &str, results: &[SearchResult], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results for '{}'", query);
        return Ok(());
    }
    for (rank, r) in results.iter().enumerate() {
        println!("{}. {} ({}) score={:.4}", rank + 1, r.doc_id, r.filename, r.score);
        if r.match_info.token_overlap > 0 {
            println!("   matched: {}", r.match_info.matched_tokens.join(", "));
        }
        println!("   {}", r.preview);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_for_env(&cli.env)?;
    let settings = config.settings()?;
    info!(env = %cli.env, docs_dir = %settings.docs_dir().display(), "configuration loaded");

    match cli.command {
        Command::Index { force, prune } => {
            let engine = open_engine(&settings, !cli.json).await?;
            let mut report = engine.rebuild(force).await?;
            if prune && report.pruned == 0 && report.stale_entries > 0 {
                report.pruned = engine.prune_stale().await?;
            }
            print_report(&report, cli.json)?;
        }
        Command::Search { query, top_k, expand } => {
            let engine = open_engine(&settings, false).await?;
            engine.rebuild(false).await?;
            let k = top_k.unwrap_or(settings.search.top_k);
            let results = engine.search(&query, k, expand).await?;
            print_results(&query, &results, cli.json)?;
        }
        Command::Status => {
            let engine = open_engine(&settings, false).await?;
            engine.load_docs()?;
            let health = engine.health().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("state:         {:?}", health.state);
                println!("documents:     {}", health.docs_loaded);
                println!("cache entries: {}", health.cache_entries);
                println!("backend:       {}", health.backend);
            }
        }
        Command::Prune => {
            let engine = open_engine(&settings, false).await?;
            engine.load_docs()?;
            let removed = engine.prune_stale().await?;
            if cli.json {
                println!("{}", serde_json::json!({ "pruned": removed }));
            } else {
                println!("Pruned {} stale cache entries", removed);
            }
        }
    }
    Ok(())
}
