// src/services/loader.rs

//! Range loading.
//!
//! Fetches a contiguous run of rounds. A failed round is logged and skipped;
//! it never aborts the batch. Fetches may overlap up to
//! `loader.max_concurrent`, but results are consumed in round order so the
//! dataset and the progress counter stay ordered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::error::FetchError;
use crate::models::{Dataset, LoaderConfig};
use crate::services::RecordFetcher;

/// Receives `(completed, total)` after every fetch attempt.
pub trait ProgressSink {
    fn on_progress(&mut self, completed: usize, total: usize);
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn on_progress(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// A no-op progress sink.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&mut self, _completed: usize, _total: usize) {}
}

/// Shared flag that stops a running range load.
///
/// Fetches already in flight are abandoned; no new fetch is issued once the
/// flag is set. The flag stays set until [`CancelToken::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A round that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRound {
    pub round: u32,
    pub error: FetchError,
}

/// Result of one range load.
#[derive(Debug, Default)]
pub struct RangeOutcome {
    /// Successfully fetched records, ascending
    pub dataset: Dataset,
    /// Rounds in the requested range
    pub requested: usize,
    /// Rounds attempted, successful or not
    pub attempted: usize,
    pub skipped: Vec<SkippedRound>,
    /// Whether the batch stopped early on cancellation or timeout
    pub cancelled: bool,
}

impl RangeOutcome {
    pub fn loaded(&self) -> usize {
        self.dataset.len()
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }
}

/// Loads round ranges through a [`RecordFetcher`].
pub struct RangeLoader {
    fetcher: Arc<dyn RecordFetcher>,
    config: LoaderConfig,
    cancel: CancelToken,
}

impl RangeLoader {
    pub fn new(fetcher: Arc<dyn RecordFetcher>, config: LoaderConfig) -> Self {
        Self {
            fetcher,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops loads started by this loader.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fetch rounds `start..=end`.
    ///
    /// `start > end` yields an empty outcome without touching the fetcher.
    pub async fn load_range(
        &self,
        start: u32,
        end: u32,
        progress: &mut dyn ProgressSink,
    ) -> RangeOutcome {
        if start > end {
            return RangeOutcome::default();
        }

        let total = (end - start) as usize + 1;
        let concurrency = self.config.max_concurrent.max(1);
        let delay = self.config.request_delay();
        let deadline = self.config.batch_timeout().map(|t| Instant::now() + t);

        log::info!(
            "Loading rounds {}-{} ({} rounds, concurrency {})",
            start,
            end,
            total,
            concurrency
        );

        let fetcher = &self.fetcher;
        let cancel = &self.cancel;
        let stopped =
            move || cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d);

        let mut attempts = stream::iter(start..=end)
            .map(move |round| async move {
                if stopped() {
                    return (round, None);
                }
                (round, Some(fetcher.fetch(round).await))
            })
            .buffered(concurrency);

        let mut records = Vec::with_capacity(total);
        let mut outcome = RangeOutcome {
            requested: total,
            ..RangeOutcome::default()
        };

        while let Some((round, result)) = attempts.next().await {
            let Some(result) = result else {
                outcome.cancelled = true;
                break;
            };

            outcome.attempted += 1;
            match result {
                Ok(record) => records.push(record),
                Err(error) => {
                    log::warn!("Skipping round {}: {}", round, error);
                    outcome.skipped.push(SkippedRound { round, error });
                }
            }
            progress.on_progress(outcome.attempted, total);

            if stopped() {
                outcome.cancelled = outcome.attempted < total;
                break;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if outcome.cancelled {
            log::warn!(
                "Range load stopped after {}/{} rounds",
                outcome.attempted,
                total
            );
        }

        outcome.dataset = Dataset::from_records(records);
        log::info!(
            "Loaded {} of {} rounds ({} skipped)",
            outcome.loaded(),
            total,
            outcome.skipped.len()
        );
        outcome
    }
}
