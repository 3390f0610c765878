//! Load bookkeeping owned by the dataset manager.

use std::fmt;

use serde::Serialize;

use crate::models::Dataset;

/// Lifecycle of a [`DatasetManager`](crate::pipeline::DatasetManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManagerState {
    Empty,
    InitialLoading,
    Ready,
    Extending,
    FullLoading,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::InitialLoading => "initial loading",
            Self::Ready => "ready",
            Self::Extending => "extending",
            Self::FullLoading => "full loading",
        };
        f.write_str(name)
    }
}

/// Summary of what is currently loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadState {
    pub min_round: Option<u32>,
    pub max_round: Option<u32>,
    pub total_loaded: usize,
    /// Whether the initial-load summary has been surfaced already
    pub initial_notice_shown: bool,
}

impl LoadState {
    /// Refresh the round counters from the dataset.
    pub(crate) fn sync(&mut self, dataset: &Dataset) {
        self.min_round = dataset.min_round();
        self.max_round = dataset.max_round();
        self.total_loaded = dataset.len();
    }

    /// Whether the loaded span starts at round 1.
    ///
    /// Gaps inside the span are still possible; see
    /// [`Dataset::missing_rounds`].
    pub fn reaches_first_round(&self) -> bool {
        self.min_round == Some(1)
    }
}

/// How close the dataset is to the latest published round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Freshness {
    Fresh,
    NearFresh { gap: u32 },
    Stale { gap: u32 },
}

impl Freshness {
    /// Largest gap still considered near-fresh.
    pub const NEAR_FRESH_GAP: u32 = 2;

    /// Classify the distance between the newest loaded round and the latest.
    ///
    /// An empty dataset is stale by the full latest round.
    pub fn classify(max_loaded: Option<u32>, latest: u32) -> Self {
        let Some(max_loaded) = max_loaded else {
            return Self::Stale { gap: latest };
        };
        match latest.saturating_sub(max_loaded) {
            0 => Self::Fresh,
            g if g <= Self::NEAR_FRESH_GAP => Self::NearFresh { gap: g },
            g => Self::Stale { gap: g },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_classify() {
        assert_eq!(Freshness::classify(Some(1100), 1100), Freshness::Fresh);
        assert_eq!(
            Freshness::classify(Some(1098), 1100),
            Freshness::NearFresh { gap: 2 }
        );
        assert_eq!(
            Freshness::classify(Some(1097), 1100),
            Freshness::Stale { gap: 3 }
        );
        assert_eq!(Freshness::classify(None, 10), Freshness::Stale { gap: 10 });
    }

    #[test]
    fn test_empty_dataset_is_always_stale() {
        assert_eq!(Freshness::classify(None, 1), Freshness::Stale { gap: 1 });
        assert_eq!(Freshness::classify(None, 2), Freshness::Stale { gap: 2 });
        assert_eq!(Freshness::classify(None, 0), Freshness::Stale { gap: 0 });
    }

    #[test]
    fn test_reaches_first_round_ignores_gaps() {
        use crate::testing::sample_record;

        let mut state = LoadState::default();
        assert!(!state.reaches_first_round());

        let dataset: Dataset = [1, 2, 5].into_iter().map(sample_record).collect();
        state.sync(&dataset);
        assert!(state.reaches_first_round());
        assert_eq!(dataset.missing_rounds(), vec![3, 4]);
    }

    #[test]
    fn test_freshness_ahead_of_estimate() {
        // A degraded estimate may lag the data
        assert_eq!(Freshness::classify(Some(1101), 1099), Freshness::Fresh);
    }
}
