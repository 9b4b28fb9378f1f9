//! # Avicenne CLI
//!
//! Command-line interface over the retrieval engine.
//!
//! ## Usage
//!
//! ```bash
//! avicenne --config ./config/avicenne.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `avicenne init` | Create the data directories and an empty corpus file |
//! | `avicenne fetch "<query>"` | Cache a query's documents (scrape on miss) |
//! | `avicenne search "<query>" "<text>"` | Rank the query's documents against `text` |
//! | `avicenne ask "<query>" "<text>"` | Search, then summarize the top results |
//! | `avicenne status` | Corpus row count and cached queries |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use avicenne::config;
use avicenne::context::{build_context, condense_content};
use avicenne::corpus::CorpusStore;
use avicenne::embedding::HttpEmbedder;
use avicenne::orchestrator::Orchestrator;
use avicenne::scrape::HttpScraper;
use avicenne::search::TopN;
use avicenne::summarize::{MistralSummarizer, Summarizer};

/// Avicenne — a caching retrieval engine for thesis-repository search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/avicenne.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "avicenne",
    about = "Avicenne — BM25 and dense similarity search over a scraped thesis corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/avicenne.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the data directories and an empty corpus file.
    ///
    /// Idempotent: an existing corpus is left untouched.
    Init,

    /// Make sure a query's documents are cached.
    ///
    /// Scrapes and rebuilds the vector index only when the query has never
    /// been served before; repeat queries are pure cache hits.
    Fetch {
        /// The raw user query.
        query: String,
    },

    /// Rank a cached query's documents against a similarity text.
    ///
    /// Runs `fetch` semantics first, so an unseen query is scraped on the
    /// way. Results come back sorted by descending relevance.
    Search {
        /// The raw user query selecting the working set.
        query: String,

        /// The text to rank the working set against.
        text: String,

        /// Similarity model: `BM25` or the configured embedding model name.
        #[arg(long)]
        model: Option<String>,

        /// Result count: an integer, or `ALL`/`MAX` for every candidate.
        #[arg(long)]
        top: Option<String>,
    },

    /// Search, then summarize the top results with the hosted model.
    ///
    /// Requires the summarizer credential; similarity search itself never
    /// does.
    Ask {
        /// The raw user query selecting the working set.
        query: String,

        /// The text to rank the working set against.
        text: String,

        /// Question for the summarizer; defaults to asking which documents
        /// match the similarity text best.
        #[arg(long)]
        prompt: Option<String>,

        /// Similarity model: `BM25` or the configured embedding model name.
        #[arg(long)]
        model: Option<String>,
    },

    /// Show corpus size and the queries already cached.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let corpus = CorpusStore::open(&cfg.corpus.path)?;
            corpus.persist()?;
            std::fs::create_dir_all(&cfg.vector_store.path)?;
            println!("Corpus initialized at {}", cfg.corpus.path.display());
        }
        Commands::Fetch { query } => {
            let orchestrator = make_orchestrator(&cfg)?;
            let set = orchestrator.ensure_cached(&query).await?;
            println!("fetch \"{}\"", query);
            println!("  query url: {}", set.query_url);
            println!("  documents in working set: {}", set.rows.len());
            println!("  corpus rows total: {}", orchestrator.corpus().len());
            println!("ok");
        }
        Commands::Search {
            query,
            text,
            model,
            top,
        } => {
            let orchestrator = make_orchestrator(&cfg)?;
            let set = orchestrator.ensure_cached(&query).await?;

            let selector = model.unwrap_or_else(|| cfg.retrieval.model.clone());
            let top_n = match top {
                Some(raw) => TopN::parse(&raw)?,
                None => TopN::Literal(cfg.retrieval.default_limit),
            };

            let ranked = orchestrator.answer(&set, &text, &selector, top_n).await?;
            if ranked.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, result) in ranked.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, result.score, result.row.title());
                println!("    url: {}", result.row.url());
                println!("    excerpt: {}", condense_content(result.row.content(), 10));
                println!();
            }
        }
        Commands::Ask {
            query,
            text,
            prompt,
            model,
        } => {
            let summarizer = match MistralSummarizer::from_config(&cfg.summarizer)? {
                Some(s) => s,
                None => anyhow::bail!(
                    "no summarizer credential in ${}; similarity search stays available via `search`",
                    cfg.summarizer.api_key_env
                ),
            };

            let orchestrator = make_orchestrator(&cfg)?;
            let set = orchestrator.ensure_cached(&query).await?;

            let selector = model.unwrap_or_else(|| cfg.retrieval.model.clone());
            let ranked = orchestrator
                .answer(&set, &text, &selector, TopN::Literal(cfg.retrieval.default_limit))
                .await?;

            let context = build_context(&ranked);
            let prompt = prompt.unwrap_or_else(|| {
                format!("Which documents relate most to the request: '{}'?", text)
            });

            let answer = summarizer.complete(&context, &prompt).await?;
            println!("{}", answer);
        }
        Commands::Status => {
            let corpus = CorpusStore::open(&cfg.corpus.path)?;
            println!("corpus: {}", cfg.corpus.path.display());
            println!("  rows: {}", corpus.len());
            let queries = corpus.distinct_queries();
            println!("  cached queries: {}", queries.len());
            for q in queries {
                println!("    {}", q);
            }
        }
    }

    Ok(())
}

fn make_orchestrator(cfg: &config::Config) -> Result<Orchestrator> {
    let scraper = Arc::new(HttpScraper::new(&cfg.scraper)?);
    let embedder = Arc::new(HttpEmbedder::new(&cfg.embedding)?);
    Ok(Orchestrator::new(cfg.clone(), scraper, embedder)?)
}
