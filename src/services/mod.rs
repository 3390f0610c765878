//! Service layer for the draw archive.
//!
//! This module contains the acquisition logic:
//! - Single-round fetching (`RecordFetcher`, `HttpRecordFetcher`)
//! - Latest-round estimation (`RoundEstimator`)
//! - Range loading with progress and cancellation (`RangeLoader`)

mod estimator;
mod fetcher;
mod loader;

pub use estimator::{RoundEstimate, RoundEstimator};
pub use fetcher::{HttpRecordFetcher, RecordFetcher, parse_payload};
pub use loader::{
    CancelToken, NullProgress, ProgressSink, RangeLoader, RangeOutcome, SkippedRound,
};
