//! Lotto Archive CLI
//!
//! Loads, backfills and inspects the local draw history cache.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use lotto_archive::{
    error::Result,
    models::{Config, LoadState},
    pipeline::{DatasetManager, ExtendOutcome, LoadReport, LoadSource},
    services::{HttpRecordFetcher, RoundEstimator},
    storage::{CacheStore, LocalCacheStore},
};

/// Lotto Archive - weekly draw history fetcher
#[derive(Parser, Debug)]
#[command(
    name = "lotto-archive",
    version,
    about = "Fetches and caches the weekly lottery draw history"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "lotto.toml")]
    config: PathBuf,

    /// Directory holding the snapshot cache (overrides the config file)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the dataset from cache or the newest rounds from the source
    Load,

    /// Load, then backfill older rounds
    Extend {
        /// Number of older rounds to add (default: dataset.extend_count)
        #[arg(long, conflicts_with = "large", value_parser = clap::value_parser!(u32).range(1..))]
        count: Option<u32>,

        /// Add dataset.extend_large_count rounds
        #[arg(long)]
        large: bool,
    },

    /// Reload every round from 1 and overwrite the cache
    Reload,

    /// Load, then report how close the dataset is to the latest round
    Status,

    /// Estimate and verify the latest published round
    Latest,

    /// Show cached snapshot info
    Info,

    /// Validate configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Progress sink that logs every tenth round and the last one.
fn progress_logger() -> impl FnMut(usize, usize) {
    |done: usize, total: usize| {
        if done % 10 == 0 || done == total {
            log::info!("Progress: {}/{} rounds", done, total);
        }
    }
}

fn log_report(report: &LoadReport) {
    match report.source {
        LoadSource::Cache => log::info!("Served {} rounds from cache", report.loaded),
        LoadSource::Network => log::info!(
            "Fetched {} of {} rounds ({} skipped)",
            report.loaded,
            report.requested,
            report.skipped.len()
        ),
    }
    if !report.skipped.is_empty() {
        log::warn!("Skipped rounds by cause: {:?}", report.skipped_by_kind());
    }
    if report.latest.is_degraded() {
        log::warn!(
            "Latest round {} is an unverified estimate",
            report.latest.round
        );
    }
    if report.is_partial() {
        log::warn!("Fewer rounds than requested were loaded");
    }
    if report.cancelled {
        log::warn!("Loading stopped before the range was complete");
    }
    if report.source == LoadSource::Network && !report.cache_saved {
        log::warn!("Cache unavailable; results kept in memory only");
    }
}

fn log_load_state(state: &LoadState) {
    match (state.min_round, state.max_round) {
        (Some(min), Some(max)) => log::info!(
            "Dataset: rounds {}-{} ({} records{})",
            min,
            max,
            state.total_loaded,
            if state.reaches_first_round() {
                ", starts at round 1"
            } else {
                ""
            }
        ),
        _ => log::info!("Dataset is empty"),
    }
}

async fn load(manager: &mut DatasetManager) -> Result<()> {
    let report = manager.initial_load(&mut progress_logger()).await?;
    if let Some(notice) = manager.take_initial_notice() {
        log::info!("{}", notice);
    }
    log_report(&report);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = dir;
    }
    log::debug!("Cache directory: {}", config.cache.dir.display());

    match cli.command {
        Command::Load => {
            let mut manager = DatasetManager::from_config(&config)?;
            load(&mut manager).await?;
            log_load_state(manager.load_state());
        }

        Command::Extend { count, large } => {
            let mut manager = DatasetManager::from_config(&config)?;
            load(&mut manager).await?;

            let requested = match (count, large) {
                (Some(count), _) => count,
                (None, true) => manager.counts().extend_large_count,
                (None, false) => manager.counts().extend_count,
            };
            match manager.extend(requested, &mut progress_logger()).await? {
                ExtendOutcome::Extended(report) => log_report(&report),
                ExtendOutcome::AllHistoryLoaded => {
                    log::info!("All history is already loaded; nothing to add")
                }
            }
            log_load_state(manager.load_state());
        }

        Command::Reload => {
            let mut manager = DatasetManager::from_config(&config)?;
            let report = manager.full_reload(&mut progress_logger()).await?;
            log_report(&report);
            log_load_state(manager.load_state());
        }

        Command::Status => {
            let mut manager = DatasetManager::from_config(&config)?;
            load(&mut manager).await?;
            log_load_state(manager.load_state());
            log::info!("Freshness: {:?}", manager.freshness().await);
        }

        Command::Latest => {
            let fetcher = Arc::new(HttpRecordFetcher::new(&config.source)?);
            let estimator = RoundEstimator::new(config.schedule.clone(), fetcher);
            let now = Utc::now();
            let expected = estimator.estimate_expected_round(now);
            let estimate = estimator.verify_latest_round(expected).await;

            log::info!("Expected round from calendar: {}", expected);
            if estimate.verified {
                log::info!("Latest published round: {}", estimate.round);
            } else {
                log::warn!(
                    "Could not verify; assuming latest round {}",
                    estimate.round
                );
            }
        }

        Command::Info => {
            let store = LocalCacheStore::from_config(&config.cache);
            log::info!("Cache file: {}", store.snapshot_path().display());

            match store.inspect().await {
                Some(snapshot) => {
                    let age = snapshot.age(Utc::now());
                    log::info!("Rounds cached: {}", snapshot.total_rounds);
                    log::info!(
                        "Last updated: {} ({}h ago, {})",
                        snapshot.last_updated,
                        age.num_hours(),
                        if age > config.cache.ttl() {
                            "expired"
                        } else {
                            "valid"
                        }
                    );
                    if let Some(latest) = snapshot.data.latest() {
                        log::info!(
                            "Latest cached round: {} ({})",
                            latest.round(),
                            latest.date()
                        );
                    }
                    let missing = snapshot.data.missing_rounds();
                    if !missing.is_empty() {
                        log::info!("Missing rounds: {:?}", missing);
                    }
                }
                None => log::info!("No usable snapshot found."),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
