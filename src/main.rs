use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use names_sync::app::ports::{AnnotatedListPort, CandidateSourcePort, MatchingOraclePort};
use names_sync::app::sync_use_case::{ExistingIndex, RunOptions, SyncUseCase};
use names_sync::config::Config;
use names_sync::constants::DEFAULT_MAX_ITEMS;
use names_sync::infra::candidate_cache::CandidateCache;
use names_sync::infra::candidate_source::CandidateSourceAdapter;
use names_sync::infra::http_client::build_client;
use names_sync::infra::row_source::row_source_from_config;
use names_sync::infra::vliz_client::AnnotatedListClient;
use names_sync::infra::worms_oracle::WormsOracle;
use names_sync::types::{MatchDecision, SyncOutcome};
use names_sync::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "names-sync")]
#[command(about = "Sync non-matching occurrence names to the curated annotated list")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./names-sync.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for JSON log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add unresolved non-matching names to the annotated list
    Sync {
        /// Maximum number of creation attempts
        #[arg(long, default_value_t = DEFAULT_MAX_ITEMS, conflicts_with = "unbounded")]
        max_items: u32,
        /// No creation limit
        #[arg(long)]
        unbounded: bool,
        /// Evaluate and report without writing to the annotated list
        #[arg(long)]
        dry_run: bool,
        /// Bypass the cached candidate list
        #[arg(long)]
        no_cache: bool,
        /// Write a JSON run report into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Ask the matching oracle whether a name resolves without curation
    Check {
        name: String,
        #[arg(long)]
        authorship: Option<String>,
    },
    /// Fetch the annotated list and summarize it
    ListAnnotated,
    /// Show the highest-ranked candidate names
    Candidates {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        no_cache: bool,
    },
    /// Manage the local candidate cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached entry
    Clear,
    /// Remove expired entries
    Purge,
}

fn candidate_source(config: &Config, no_cache: bool) -> Result<CandidateSourceAdapter> {
    config.validate_for_source()?;
    let rows = row_source_from_config(&config.source)?;
    let adapter = CandidateSourceAdapter::new(rows).with_query(config.source.query.clone());

    if no_cache || !config.cache.enabled {
        return Ok(adapter);
    }
    let cache_dir = config.cache.resolved_dir();
    match CandidateCache::open_at_root(&cache_dir) {
        Ok(cache) => Ok(adapter.with_cache(cache, config.cache.ttl())),
        Err(e) => {
            warn!("Candidate cache unavailable at {}: {}", cache_dir.display(), e);
            Ok(adapter)
        }
    }
}

async fn run_sync(config: &Config, options: RunOptions, no_cache: bool, report_dir: Option<PathBuf>) -> Result<()> {
    config.validate_for_sync()?;
    metrics::init_metrics();

    let client = build_client(&config.http)?;
    let list = AnnotatedListClient::from_config(client.clone(), config)
        .await
        .context("authenticating against the annotated list")?;
    let oracle = WormsOracle::new(client.clone(), &config.oracle.endpoint)
        .with_rate_limit(config.oracle.requests_per_minute);
    let source = candidate_source(config, no_cache)?;

    let sync = SyncUseCase::new(Arc::new(list), Arc::new(oracle), Arc::new(source));
    let result = sync.run(options).await;

    if let Some(url) = &config.metrics.pushgateway_url {
        metrics::push_to_gateway(&client, url, "sync").await;
    }

    let report = result.context("sync run failed")?;

    println!("\n📊 Sync results{}:", if report.dry_run { " (dry run)" } else { "" });
    println!("   Existing entries: {}", report.existing_entries);
    println!("   Candidates: {}", report.candidates_total);
    for (outcome, count) in report.tally() {
        println!("   {}: {}", outcome, count);
    }
    for entry in report.entries.iter().filter(|e| e.outcome != SyncOutcome::SkippedAlreadyListed) {
        println!(
            "   - {} [{}] {}",
            entry.scientific_name,
            entry.scientific_name_authorship.as_deref().unwrap_or(""),
            entry.outcome
        );
    }

    if let Some(dir) = report_dir {
        let path = report.write_json(&dir)?;
        println!("💾 Saved report to {}", path);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&cli.log_dir);

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if config.object_store.is_some() {
        warn!("Object store settings are recognized but archival export/import is not performed");
    }

    match cli.command {
        Commands::Sync {
            max_items,
            unbounded,
            dry_run,
            no_cache,
            report_dir,
        } => {
            let options = RunOptions {
                max_items: if unbounded { None } else { Some(max_items) },
                dry_run,
            };
            info!("Starting sync with {:?}", options);
            if let Err(e) = run_sync(&config, options, no_cache, report_dir).await {
                error!("Sync failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::Check { name, authorship } => {
            let client = build_client(&config.http)?;
            let oracle = WormsOracle::new(client, &config.oracle.endpoint);
            match oracle.is_authority_resolved(&name, authorship.as_deref()).await {
                MatchDecision::ExactMatch => println!("✅ {} has an exact authority match", name),
                MatchDecision::NoMatch => println!("❔ {} needs curation (no exact match)", name),
                MatchDecision::LookupFailed(failure) => {
                    anyhow::bail!("lookup for {} failed: {}", name, failure)
                }
            }
        }
        Commands::ListAnnotated => {
            let client = build_client(&config.http)?;
            let list = AnnotatedListClient::from_config(client, &config).await?;
            let entries = list.fetch_all().await?;
            let index = ExistingIndex::from_entries(&entries);
            println!("📋 Annotated list: {} entries, {} distinct keys", entries.len(), index.len());
        }
        Commands::Candidates { limit, no_cache } => {
            let source = candidate_source(&config, no_cache)?;
            let candidates = source.list_candidates().await?;
            println!("🔎 {} candidate names", candidates.len());
            for candidate in candidates.iter().take(limit) {
                println!("   {:>8}  {}", candidate.record_count, candidate.identity_key());
            }
        }
        Commands::Cache { action } => {
            let cache = CandidateCache::open_at_root(config.cache.resolved_dir())?;
            let removed = match action {
                CacheAction::Clear => cache.clear()?,
                CacheAction::Purge => cache.purge_expired()?,
            };
            println!("🧹 Removed {} cache entries", removed);
        }
    }
    Ok(())
}
