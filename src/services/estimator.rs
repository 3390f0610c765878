// src/services/estimator.rs

//! Latest-round estimation.
//!
//! The current round is derived from the weekly calendar and then confirmed
//! by probing the source for the estimate and a few rounds below it.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Offset, Timelike, Utc};

use crate::models::ScheduleConfig;
use crate::services::RecordFetcher;

/// Result of verifying the estimated latest round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundEstimate {
    pub round: u32,
    /// `false` when no probe succeeded and `round` is the fallback guess
    pub verified: bool,
}

impl RoundEstimate {
    pub fn is_degraded(&self) -> bool {
        !self.verified
    }
}

/// Estimates and verifies the latest published round.
pub struct RoundEstimator {
    schedule: ScheduleConfig,
    fetcher: Arc<dyn RecordFetcher>,
}

impl RoundEstimator {
    pub fn new(schedule: ScheduleConfig, fetcher: Arc<dyn RecordFetcher>) -> Self {
        Self { schedule, fetcher }
    }

    /// Round expected to be the newest at `now`, from the calendar alone.
    pub fn estimate_expected_round(&self, now: DateTime<Utc>) -> u32 {
        let offset = self.schedule.utc_offset().unwrap_or(Utc.fix());
        let local = now.with_timezone(&offset);

        let days = (local.date_naive() - self.schedule.epoch_date).num_days();
        let mut expected = 1 + days.div_euclid(7);

        let draw_published =
            local.weekday() == self.schedule.draw_weekday && local.hour() >= self.schedule.draw_hour;
        if draw_published {
            expected += 1;
        }

        expected.clamp(1, u32::MAX as i64) as u32
    }

    /// Probe `expected` and the rounds below it, newest first.
    ///
    /// Falls back to `expected - fallback_margin` (at least 1) when every
    /// probe fails; the result is then marked unverified.
    pub async fn verify_latest_round(&self, expected: u32) -> RoundEstimate {
        let depth = self.schedule.probe_depth;
        let candidates = (0..depth).filter_map(|back| expected.checked_sub(back));

        for candidate in candidates.filter(|&round| round >= 1) {
            match self.fetcher.fetch(candidate).await {
                Ok(_) => {
                    log::debug!("Verified latest round {} (expected {})", candidate, expected);
                    return RoundEstimate {
                        round: candidate,
                        verified: true,
                    };
                }
                Err(error) => {
                    log::debug!("Probe for round {} failed: {}", candidate, error);
                }
            }
        }

        let fallback = expected.saturating_sub(self.schedule.fallback_margin).max(1);
        log::warn!(
            "Could not verify any round from {} down {} probes; assuming round {}",
            expected,
            depth,
            fallback
        );
        RoundEstimate {
            round: fallback,
            verified: false,
        }
    }

    /// Estimate from the calendar, then verify against the source.
    pub async fn latest_round(&self, now: DateTime<Utc>) -> RoundEstimate {
        let expected = self.estimate_expected_round(now);
        self.verify_latest_round(expected).await
    }
}
