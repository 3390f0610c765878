//! Pipeline entry points for archive operations.
//!
//! - `DatasetManager`: initial load, backfill and full reload of the dataset

pub mod manager;

pub use manager::{DatasetManager, ExtendOutcome, LoadReport, LoadSource};
