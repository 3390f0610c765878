// src/models/mod.rs

//! Domain models for the draw archive.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod dataset;
mod draw;
mod state;

// Re-export all public types
pub use config::{CacheConfig, Config, DatasetConfig, LoaderConfig, ScheduleConfig, SourceConfig};
pub use dataset::Dataset;
pub use draw::{DrawRecord, MAX_NUMBER, MIN_NUMBER};
pub use state::{Freshness, LoadState, ManagerState};
