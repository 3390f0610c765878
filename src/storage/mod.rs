//! Snapshot cache for the draw dataset.
//!
//! The whole dataset is persisted as one JSON document:
//!
//! ```text
//! {dir}/
//! └── lotto_cache.json      # { data: [...], last_updated, total_rounds }
//! ```
//!
//! A snapshot older than the TTL, or one that fails to decode, is treated as
//! absent. Nothing is deleted on read.

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Dataset;

// Re-export for convenience
pub use local::LocalCacheStore;

/// Persisted form of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Records, ascending by round
    pub data: Dataset,
    /// Moment of the save that wrote `data`
    pub last_updated: DateTime<Utc>,
    /// Number of records in `data`
    pub total_rounds: usize,
}

impl CacheSnapshot {
    pub fn new(data: Dataset, saved_at: DateTime<Utc>) -> Self {
        Self {
            total_rounds: data.len(),
            data,
            last_updated: saved_at,
        }
    }

    pub fn max_round(&self) -> Option<u32> {
        self.data.max_round()
    }

    /// Time elapsed since the snapshot was written.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_updated
    }

    /// Whether the recorded count agrees with the data.
    pub fn is_consistent(&self) -> bool {
        self.total_rounds == self.data.len()
    }
}

/// Metadata about a snapshot write.
#[derive(Debug, Clone)]
pub struct SaveSummary {
    /// Number of records written
    pub total_rounds: usize,
    /// Timestamp stored in the snapshot
    pub timestamp: DateTime<Utc>,
    /// File the snapshot was written to
    pub location: PathBuf,
}

/// Trait for snapshot cache backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Persist the dataset, stamped with the current time.
    async fn save(&self, dataset: &Dataset) -> Result<SaveSummary>;

    /// Load the snapshot if present, well-formed and within the TTL.
    async fn load(&self) -> Option<CacheSnapshot>;

    /// Load the snapshot if present and well-formed, ignoring its age.
    async fn inspect(&self) -> Option<CacheSnapshot>;
}
