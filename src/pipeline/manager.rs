// src/pipeline/manager.rs

//! Dataset lifecycle.
//!
//! `DatasetManager` owns the in-memory dataset and drives the estimator,
//! range loader and snapshot cache through three operations:
//!
//! - initial load: `Empty → InitialLoading → Ready`
//! - backfill: `Ready → Extending → Ready`
//! - full reload: `→ FullLoading → Ready`
//!
//! Every operation takes `&mut self`, so only one can be in flight per
//! manager. None of them fail on network or cache problems; those surface
//! as fewer loaded rounds or `cache_saved = false` in the report.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, FetchErrorKind, Result};
use crate::models::{Config, Dataset, DatasetConfig, Freshness, LoadState, ManagerState};
use crate::services::{
    CancelToken, HttpRecordFetcher, ProgressSink, RangeLoader, RangeOutcome, RecordFetcher,
    RoundEstimate, RoundEstimator, SkippedRound,
};
use crate::storage::{CacheSnapshot, CacheStore, LocalCacheStore};
use crate::utils::{Clock, SystemClock};

/// Where the data of a load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    Network,
}

/// Summary of one manager operation.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub source: LoadSource,
    /// Latest round the operation worked against
    pub latest: RoundEstimate,
    /// Rounds requested from the source (0 when served from cache)
    pub requested: usize,
    /// Records added to or placed in the dataset
    pub loaded: usize,
    pub skipped: Vec<SkippedRound>,
    /// Whether the range load stopped early
    pub cancelled: bool,
    /// Whether the resulting dataset reached the cache
    pub cache_saved: bool,
}

impl LoadReport {
    fn from_cache(latest: RoundEstimate, snapshot: &CacheSnapshot) -> Self {
        Self {
            source: LoadSource::Cache,
            latest,
            requested: 0,
            loaded: snapshot.data.len(),
            skipped: Vec::new(),
            cancelled: false,
            cache_saved: false,
        }
    }

    fn from_range(latest: RoundEstimate, outcome: &RangeOutcome) -> Self {
        Self {
            source: LoadSource::Network,
            latest,
            requested: outcome.requested,
            loaded: outcome.loaded(),
            skipped: outcome.skipped.clone(),
            cancelled: outcome.cancelled,
            cache_saved: false,
        }
    }

    /// Fewer rounds loaded than requested.
    pub fn is_partial(&self) -> bool {
        self.loaded < self.requested
    }

    /// Number of skipped rounds per failure kind.
    pub fn skipped_by_kind(&self) -> BTreeMap<FetchErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.error.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Result of a backfill request.
#[derive(Debug, Clone)]
pub enum ExtendOutcome {
    Extended(LoadReport),
    /// The dataset already starts at round 1
    AllHistoryLoaded,
}

/// Owner of the in-memory dataset.
pub struct DatasetManager {
    counts: DatasetConfig,
    staleness_tolerance: u32,
    clock: Arc<dyn Clock>,
    estimator: RoundEstimator,
    loader: RangeLoader,
    cache: Arc<dyn CacheStore>,
    dataset: Dataset,
    load_state: LoadState,
    state: ManagerState,
    latest: Option<RoundEstimate>,
    initial_notice: Option<String>,
}

impl DatasetManager {
    /// Assemble a manager from explicit collaborators.
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn RecordFetcher>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            counts: config.dataset.clone(),
            staleness_tolerance: config.cache.staleness_tolerance,
            clock,
            estimator: RoundEstimator::new(config.schedule.clone(), Arc::clone(&fetcher)),
            loader: RangeLoader::new(fetcher, config.loader.clone()),
            cache,
            dataset: Dataset::new(),
            load_state: LoadState::default(),
            state: ManagerState::Empty,
            latest: None,
            initial_notice: None,
        }
    }

    /// Manager wired to the HTTP source and the local cache directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpRecordFetcher::new(&config.source)?);
        let cache = Arc::new(LocalCacheStore::from_config(&config.cache));
        Ok(Self::new(config, fetcher, cache, Arc::new(SystemClock)))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Latest round determined by the last initial load or full reload.
    pub fn latest_estimate(&self) -> Option<RoundEstimate> {
        self.latest
    }

    /// Token that stops the range load of the running operation.
    ///
    /// Each operation clears the token before it starts loading.
    pub fn cancel_token(&self) -> CancelToken {
        self.loader.cancel_token()
    }

    /// Batch sizes configured for this manager.
    pub fn counts(&self) -> &DatasetConfig {
        &self.counts
    }

    /// Summary of the initial load, returned only the first time.
    pub fn take_initial_notice(&mut self) -> Option<String> {
        if self.load_state.initial_notice_shown {
            return None;
        }
        let notice = self.initial_notice.take()?;
        self.load_state.initial_notice_shown = true;
        Some(notice)
    }

    /// Populate the dataset from the cache or, failing that, the newest rounds.
    ///
    /// A transitional state at entry means an earlier call was abandoned
    /// mid-flight; the load is simply restarted.
    pub async fn initial_load(&mut self, progress: &mut dyn ProgressSink) -> Result<LoadReport> {
        if !matches!(
            self.state,
            ManagerState::Empty | ManagerState::InitialLoading
        ) {
            return Err(AppError::state("run the initial load", self.state));
        }
        self.state = ManagerState::InitialLoading;

        let latest = self.estimator.latest_round(self.clock.now()).await;
        self.latest = Some(latest);

        if let Some(snapshot) = self.cache.load().await {
            if self.cache_is_acceptable(&snapshot, latest.round) {
                log::info!(
                    "Using cached snapshot: {} rounds up to {:?} (latest {})",
                    snapshot.total_rounds,
                    snapshot.max_round(),
                    latest.round
                );
                let report = LoadReport::from_cache(latest, &snapshot);
                self.replace_dataset(snapshot.data);
                self.finish_initial(&report);
                return Ok(report);
            }
            log::info!(
                "Cached snapshot ends at {:?}, more than {} rounds behind {}; refetching",
                snapshot.max_round(),
                self.staleness_tolerance,
                latest.round
            );
        }

        self.loader.cancel_token().reset();
        let count = self.counts.initial_count.min(latest.round);
        let start = (latest.round - count + 1).max(1);
        let outcome = self.loader.load_range(start, latest.round, progress).await;

        let mut report = LoadReport::from_range(latest, &outcome);
        self.replace_dataset(outcome.into_dataset());
        report.cache_saved = self.persist().await;
        self.finish_initial(&report);
        Ok(report)
    }

    /// Load up to `requested` rounds older than the current minimum.
    pub async fn extend(
        &mut self,
        requested: u32,
        progress: &mut dyn ProgressSink,
    ) -> Result<ExtendOutcome> {
        if !matches!(self.state, ManagerState::Ready | ManagerState::Extending) {
            return Err(AppError::state("extend the dataset", self.state));
        }
        let Some(latest) = self.latest else {
            return Err(AppError::state("extend the dataset", self.state));
        };

        // An empty dataset backfills downward from the latest round
        let current_min = self
            .dataset
            .min_round()
            .unwrap_or_else(|| latest.round.saturating_add(1));
        if current_min <= 1 {
            log::info!("All history already loaded (dataset starts at round 1)");
            self.state = ManagerState::Ready;
            return Ok(ExtendOutcome::AllHistoryLoaded);
        }
        let additional = requested.min(current_min - 1);
        if additional == 0 {
            log::info!("No rounds requested; dataset unchanged");
            self.state = ManagerState::Ready;
            return Ok(ExtendOutcome::Extended(LoadReport::from_range(
                latest,
                &RangeOutcome::default(),
            )));
        }

        self.state = ManagerState::Extending;
        self.loader.cancel_token().reset();
        let start = current_min - additional;
        let outcome = self
            .loader
            .load_range(start, current_min - 1, progress)
            .await;

        let mut report = LoadReport::from_range(latest, &outcome);
        self.dataset.merge(outcome.into_dataset());
        self.load_state.sync(&self.dataset);
        report.cache_saved = self.persist().await;
        self.state = ManagerState::Ready;

        log::info!(
            "Backfilled {} of {} rounds; dataset now {} rounds",
            report.loaded,
            report.requested,
            self.dataset.len()
        );
        Ok(ExtendOutcome::Extended(report))
    }

    /// Replace the dataset with every round from 1 to the verified latest.
    ///
    /// A cancelled reload is merged into the existing dataset instead of
    /// replacing it, so no previously loaded round is lost.
    pub async fn full_reload(&mut self, progress: &mut dyn ProgressSink) -> Result<LoadReport> {
        self.state = ManagerState::FullLoading;

        let latest = self.estimator.latest_round(self.clock.now()).await;
        self.latest = Some(latest);

        self.loader.cancel_token().reset();
        let outcome = self.loader.load_range(1, latest.round, progress).await;
        let mut report = LoadReport::from_range(latest, &outcome);

        if outcome.cancelled {
            self.dataset.merge(outcome.into_dataset());
            self.load_state.sync(&self.dataset);
        } else {
            self.replace_dataset(outcome.into_dataset());
        }
        report.cache_saved = self.persist().await;
        self.state = ManagerState::Ready;
        Ok(report)
    }

    /// Compare the dataset against a freshly verified latest round.
    pub async fn freshness(&self) -> Freshness {
        let latest = self.estimator.latest_round(self.clock.now()).await;
        Freshness::classify(self.dataset.max_round(), latest.round)
    }

    fn cache_is_acceptable(&self, snapshot: &CacheSnapshot, latest: u32) -> bool {
        let oldest_acceptable = latest.saturating_sub(self.staleness_tolerance);
        snapshot
            .max_round()
            .is_some_and(|max| max >= oldest_acceptable)
    }

    fn replace_dataset(&mut self, dataset: Dataset) {
        self.dataset = dataset;
        self.load_state.sync(&self.dataset);
    }

    fn finish_initial(&mut self, report: &LoadReport) {
        let origin = match report.source {
            LoadSource::Cache => "from cache",
            LoadSource::Network => "from the source",
        };
        let notice = match (self.dataset.min_round(), self.dataset.max_round()) {
            (Some(min), Some(max)) => format!(
                "Loaded {} rounds ({}-{}) {}",
                self.dataset.len(),
                min,
                max,
                origin
            ),
            _ => "No rounds could be loaded".to_string(),
        };
        self.initial_notice = Some(notice);
        self.state = ManagerState::Ready;
    }

    /// Save the dataset, logging instead of failing.
    async fn persist(&self) -> bool {
        if self.dataset.is_empty() {
            log::warn!("Nothing loaded; leaving the existing cache untouched");
            return false;
        }
        match self.cache.save(&self.dataset).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Cache unavailable, continuing without it: {}", e);
                false
            }
        }
    }
}
