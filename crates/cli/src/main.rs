//! graphsearch CLI - map-reduce global search over community reports
//!
//! This binary provides the command-line interface for the graphsearch system.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphsearch_core::config::Config;
use graphsearch_global_search::{GlobalSearchOrchestrator, SearchRequest};
use graphsearch_storage::{create_prompt_cache, PostgresPromptCache};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphsearch")]
#[command(about = "Map-reduce global search over graph community reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question against a graph
    Search {
        /// The question to answer
        query: String,

        /// Graph id as configured under [graphs.<id>]
        #[arg(short, long)]
        graph: String,

        /// Restrict the search to these entities (repeatable)
        #[arg(short, long = "entity", value_name = "TITLE")]
        entities: Vec<String>,

        /// Language the answer should be written in
        #[arg(short, long)]
        language: Option<String>,

        /// Bypass the cache and print the full map/reduce trace as JSON
        #[arg(long)]
        detailed: bool,
    },
    /// List previously answered prompts for a graph, newest first
    History {
        #[arg(short, long)]
        graph: String,
    },
    /// Apply prompt cache migrations to the configured Postgres database
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command {
        Some(Commands::Search {
            query,
            graph,
            entities,
            language,
            detailed,
        }) => {
            let mut request = SearchRequest::new(query, graph);
            if !entities.is_empty() {
                request = request.with_entity_subset(entities);
            }
            if let Some(language) = language {
                request = request.with_language(language);
            }
            search(cli.config.as_deref(), request, detailed).await
        }
        Some(Commands::History { graph }) => history(cli.config.as_deref(), &graph).await,
        Some(Commands::Migrate) => migrate(cli.config.as_deref()).await,
        None => {
            println!("Run 'graphsearch search --graph <ID> \"<QUESTION>\"', or --help for more options");
            Ok(())
        }
    }
}

/// Initialize logging system; logs go to stderr so answers can be piped
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("graphsearch={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    Config::load(config_path).context("Failed to load configuration")
}

async fn search(config_path: Option<&Path>, request: SearchRequest, detailed: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let orchestrator = GlobalSearchOrchestrator::from_config(&config)
        .await
        .context("Failed to initialize global search")?;

    if detailed {
        let result = orchestrator
            .search_detailed(request)
            .await
            .context("Global search failed")?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let response = orchestrator
            .search(request)
            .await
            .context("Global search failed")?;
        if response.cache_hit {
            info!("Answer served from prompt cache");
        }
        println!("{}", response.response_text);
    }
    Ok(())
}

async fn history(config_path: Option<&Path>, graph: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = create_prompt_cache(&config.storage)
        .await
        .context("Failed to open prompt cache")?;

    let entries = cache
        .history(graph)
        .await
        .context("Failed to read prompt history")?;
    if entries.is_empty() {
        println!("No prompts recorded for graph '{graph}'");
        return Ok(());
    }
    for entry in entries {
        if entry.nodes.is_empty() {
            println!("{}", entry.prompt);
        } else {
            println!("{}  [{}]", entry.prompt, entry.nodes.to_vec().join(", "));
        }
    }
    Ok(())
}

async fn migrate(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = PostgresPromptCache::connect(&config.storage)
        .await
        .context("Failed to connect to Postgres")?;

    info!("Running database migrations");
    cache
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed successfully");
    Ok(())
}
