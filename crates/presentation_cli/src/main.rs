//! Query cache CLI
//!
//! Command-line interface for inspecting and maintaining the cache tiers.

#![allow(clippy::print_stdout)]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use domain::DocumentChangeKind;
use infrastructure::{AppConfig, init_telemetry};

/// Query cache CLI
#[derive(Parser)]
#[command(name = "querycache-cli")]
#[command(author, version, about = "Query cache administration", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: optional ./config.toml)
    #[arg(short, long, env = "QUERYCACHE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective values
    CheckConfig,

    /// Print cache, store and reranker statistics
    Stats,

    /// Evict retrieval results that reference a document
    ///
    /// Example: querycache-cli invalidate --document tender-42 --kind content_update
    Invalidate {
        /// Document id
        #[arg(short, long)]
        document: String,

        /// Change kind: status_change, content_update or delete
        #[arg(short, long, default_value = "content_update")]
        kind: DocumentChangeKind,
    },

    /// Drop every retrieval result (after a full reindex)
    Reindex,

    /// Remove expired entries from the Tier 2 store
    PurgeExpired,

    /// Score documents against a query with the configured reranker
    ///
    /// Example: querycache-cli rerank --query "bid bond" --doc "..." --doc "..."
    Rerank {
        /// Query text
        #[arg(short, long)]
        query: String,

        /// Candidate text, repeatable
        #[arg(short, long = "doc", required = true)]
        docs: Vec<String>,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    config.telemetry.log_filter = log_filter_from_verbosity(cli.verbose).to_string();
    init_telemetry(&config.telemetry)?;

    let report = match cli.command {
        Commands::CheckConfig => match commands::check_config(&config) {
            Ok(report) => report,
            Err(e) => {
                println!("❌ Invalid configuration: {e}");
                std::process::exit(1);
            },
        },
        Commands::Stats => commands::stats(&config).await?,
        Commands::Invalidate { document, kind } => {
            commands::invalidate(&config, &document, kind).await?
        },
        Commands::Reindex => commands::reindex(&config).await?,
        Commands::PurgeExpired => commands::purge_expired(&config).await?,
        Commands::Rerank { query, docs } => commands::rerank(&config, &query, &docs).await?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
