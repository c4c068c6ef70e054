//! # Product Search CLI (`psearch`)
//!
//! The `psearch` binary serves the search API and offers a one-shot search
//! command for local experimentation.
//!
//! ## Usage
//!
//! ```bash
//! psearch --config ./config/psearch.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `psearch serve` | Load the catalog, build the index, start the HTTP API |
//! | `psearch search "<query>"` | Build the index and run one query from the CLI |
//! | `psearch rebuild-check` | Embed the whole catalog and report counts, then exit |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use product_search::catalog::load_catalog;
use product_search::config::{load_config, Config};
use product_search::embedding::create_provider;
use product_search::index::HybridIndex;
use product_search::merge::merged_search;
use product_search::models::Rewrite;
use product_search::rewrite::create_rewriter;
use product_search::server::run_server;

/// Product Search — hybrid semantic + fuzzy search for marketplace
/// catalogs.
#[derive(Parser)]
#[command(
    name = "psearch",
    about = "Hybrid semantic + fuzzy search service for marketplace product catalogs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/psearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    ///
    /// Loads the catalog file (if configured), performs the initial
    /// rebuild, and serves `/health`, `/search`, and `/reindex` until
    /// terminated.
    Serve,

    /// Run one query against the configured catalog and print the ranking.
    ///
    /// Builds the index in-process, so the catalog path must be set and
    /// the embedding provider reachable.
    Search {
        /// The search query string.
        query: String,

        /// Maximum results to print; 0 means all.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Dry-run a rebuild of the configured catalog and exit.
    ///
    /// Loads the catalog, embeds every indexable item through the
    /// configured provider, and prints indexed/skipped counts without
    /// starting the server. Exits non-zero if the catalog cannot be
    /// loaded or any embedding fails.
    RebuildCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Search { query, top_k } => search_once(config, &query, top_k).await,
        Commands::RebuildCheck => rebuild_check(&config).await,
    }
}

/// Build the index from config and run the initial catalog rebuild.
async fn build_index(config: &Config) -> Result<Arc<HybridIndex>> {
    let provider = create_provider(&config.embedding)?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = provider.model_name(),
        "embedding provider ready"
    );
    let index = Arc::new(HybridIndex::new(
        provider,
        config.search.semantic_weight,
        config.search.fuzzy_weight,
    ));

    if let Some(path) = &config.catalog.path {
        let items = load_catalog(path)?;
        let indexed = index.rebuild(&items).await.context("initial rebuild")?;
        tracing::info!(indexed, catalog = %path.display(), "initial catalog indexed");
    } else {
        tracing::warn!("no catalog.path configured; corpus is empty until POST /reindex");
    }

    Ok(index)
}

async fn serve(config: Arc<Config>) -> Result<()> {
    let index = build_index(&config).await?;
    let rewriter = Arc::from(create_rewriter(&config.rewriter)?);

    tracing::info!(
        semantic_weight = config.search.semantic_weight,
        fuzzy_weight = config.search.fuzzy_weight,
        "starting search service"
    );

    run_server(config, index, rewriter).await
}

async fn search_once(config: Arc<Config>, query: &str, top_k: Option<usize>) -> Result<()> {
    let index = build_index(&config).await?;
    let rewriter = create_rewriter(&config.rewriter)?;
    let limit = top_k.unwrap_or(config.search.default_top_k);

    let rewrite = match rewriter.rewrite(query).await {
        Ok(rewrite) => rewrite,
        Err(err) => {
            tracing::debug!(error = %err, "rewriter unavailable, using raw query");
            Rewrite::passthrough(query)
        }
    };

    let results = merged_search(&index, &rewrite, limit).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    if rewrite.primary != query.trim() || !rewrite.alternatives.is_empty() {
        println!(
            "query rewritten: {:?} (alternatives: {:?})",
            rewrite.primary, rewrite.alternatives
        );
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (id {})",
            i + 1,
            result.score,
            result.item.title,
            result.item.id
        );
        if !result.item.brand.is_empty() {
            println!("    brand: {}", result.item.brand);
        }
        println!(
            "    why: semantic {:.3}, fuzzy {:.3}",
            result.why.semantic, result.why.fuzzy
        );
    }

    Ok(())
}

/// Embed the configured catalog end to end without serving.
///
/// Exercises the same skip/embed pass a live reindex runs, so a green
/// check means the catalog file parses, every indexable item embeds, and
/// the provider credentials work.
async fn rebuild_check(config: &Config) -> Result<()> {
    let path = config
        .catalog
        .path
        .as_ref()
        .context("catalog.path must be configured for rebuild-check")?;
    let items = load_catalog(path)?;

    let provider = create_provider(&config.embedding)?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = provider.model_name(),
        "embedding provider ready"
    );

    let index = HybridIndex::new(
        provider,
        config.search.semantic_weight,
        config.search.fuzzy_weight,
    );
    let indexed = index.rebuild(&items).await.context("rebuild check")?;
    let skipped = items.len() - indexed;

    println!(
        "ok: {indexed} items indexed, {skipped} skipped (empty search text) from {}",
        path.display()
    );
    Ok(())
}
