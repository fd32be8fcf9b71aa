//! Shelf-Scout main entry point
//!
//! This is the command-line interface for the Shelf-Scout listing harvester.

use anyhow::Context;
use clap::Parser;
use shelf_scout::config::{load_config_with_hash, Config};
use shelf_scout::harvest::{StrategyRegistry, Target};
use shelf_scout::output::{load_statistics, print_pending, print_run_summary, print_statistics};
use shelf_scout::storage::{lock, open_storage, shared, RunStatus, Storage};
use shelf_scout::Orchestrator;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Shelf-Scout: a block-aware product listing harvester
///
/// Shelf-Scout searches every configured source for every search term,
/// paces its requests per source, retries pages that look soft-blocked, backs
/// off from hard blocks and stores each product link once.
#[derive(Parser, Debug)]
#[command(name = "shelf-scout")]
#[command(version)]
#[command(about = "A block-aware product listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Number of (source, term) pairs worked on at once; overrides the config
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Search term to run (repeatable); defaults to each source's own terms
    #[arg(short, long = "term", value_name = "TERM")]
    terms: Vec<String>,

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with_all = ["stats", "pending"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "pending"])]
    stats: bool,

    /// List jobs that were created but never started, and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    pending: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.terms)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.pending {
        handle_pending(&config)?;
    } else {
        let parallelism = cli.parallelism.unwrap_or(config.runner.parallelism);
        handle_harvest(config, &config_hash, &cli.terms, parallelism).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelf_scout=info,warn"),
            1 => EnvFilter::new("shelf_scout=debug,info"),
            2 => EnvFilter::new("shelf_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be fetched
fn handle_dry_run(config: &Config, terms: &[String]) -> anyhow::Result<()> {
    println!("=== Shelf-Scout Dry Run ===\n");

    println!("Runner:");
    println!("  Parallelism: {}", config.runner.parallelism);
    println!("  On soft block: {:?}", config.runner.on_soft_block);

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    if let Some(proxy) = &config.fetch.proxy {
        println!("  Proxy: {}", proxy);
    }
    println!("  Middleware: {}", config.fetch.middleware.join(" -> "));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let mut pair_count = 0;
    println!("\nSources ({} enabled):", config.enabled_sources().count());
    for source in &config.sources {
        if !source.enabled {
            println!("  - {} (disabled)", source.name);
            continue;
        }

        let source_terms = if terms.is_empty() {
            source.search_terms.as_slice()
        } else {
            terms
        };
        pair_count += source_terms.len();

        println!(
            "  - {}: pages {}..={}, delay {}-{}ms, {} attempts",
            source.name,
            source.start_page,
            source.pages().end.saturating_sub(1),
            source.delay_floor_ms,
            source.delay_ceiling_ms,
            source.max_attempts
        );
        for term in source_terms {
            let first = Target::new(source, term, source.start_page)?;
            println!("    * '{}' -> {}", term, first.url);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would run {} jobs", pair_count);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --pending mode: lists jobs that never started
fn handle_pending(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let jobs = storage.list_pending_jobs()?;
    print_pending(&jobs);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: &str,
    terms: &[String],
    parallelism: usize,
) -> anyhow::Result<()> {
    let storage = shared(open_storage(Path::new(&config.output.database_path))?);
    let run_id = lock(&storage)?.create_run(config_hash)?;
    tracing::info!("Starting run {}", run_id);

    let orchestrator = Orchestrator::new(config, storage.clone(), StrategyRegistry::http_default())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing requests in flight");
            on_interrupt.cancel();
        }
    });

    let summary = orchestrator
        .run_with_cancel(terms, parallelism, cancel.clone())
        .await;

    let status = if cancel.is_cancelled() {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    lock(&storage)?.finish_run(run_id, status)?;

    print_run_summary(&summary);
    Ok(())
}
