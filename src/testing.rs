// src/testing.rs

//! In-memory fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::error::FetchError;
use crate::models::DrawRecord;
use crate::services::RecordFetcher;

/// A deterministic record for `round`.
pub fn sample_record(round: u32) -> DrawRecord {
    let date = NaiveDate::from_ymd_opt(2002, 12, 7).unwrap() + Duration::weeks(round as i64 - 1);
    let base = (round % 39) as u8 + 1;
    DrawRecord::new(
        round,
        date,
        [base, base + 1, base + 2, base + 3, base + 4, base + 5],
        base + 6,
    )
    .unwrap()
}

/// Fetcher that serves rounds `1..=latest` and records every call.
pub struct ScriptedFetcher {
    latest: u32,
    failures: HashMap<u32, FetchError>,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedFetcher {
    pub fn new(latest: u32) -> Self {
        Self {
            latest,
            failures: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make `round` fail with `error`.
    pub fn failing(mut self, round: u32, error: FetchError) -> Self {
        self.failures.insert(round, error);
        self
    }

    /// Rounds requested so far, in call order.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordFetcher for ScriptedFetcher {
    async fn fetch(&self, round: u32) -> Result<DrawRecord, FetchError> {
        self.calls.lock().unwrap().push(round);
        if let Some(error) = self.failures.get(&round) {
            return Err(error.clone());
        }
        if round == 0 || round > self.latest {
            return Err(FetchError::rejected(format!("round {round}: returnValue=fail")));
        }
        Ok(sample_record(round))
    }
}
