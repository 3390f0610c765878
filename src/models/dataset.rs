//! Ordered collection of draw records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DrawRecord;

/// Draw records ordered strictly ascending by round.
///
/// Gaps are allowed; they mark rounds whose fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DrawRecord>", into = "Vec<DrawRecord>")]
pub struct Dataset {
    records: Vec<DrawRecord>,
}

impl From<Vec<DrawRecord>> for Dataset {
    fn from(records: Vec<DrawRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<Dataset> for Vec<DrawRecord> {
    fn from(dataset: Dataset) -> Self {
        dataset.records
    }
}

impl FromIterator<DrawRecord> for Dataset {
    fn from_iter<I: IntoIterator<Item = DrawRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from records in any order.
    ///
    /// When a round appears more than once the last occurrence wins.
    pub fn from_records(records: impl IntoIterator<Item = DrawRecord>) -> Self {
        let by_round: BTreeMap<u32, DrawRecord> =
            records.into_iter().map(|r| (r.round(), r)).collect();
        Self {
            records: by_round.into_values().collect(),
        }
    }

    /// Merge freshly fetched records into this dataset.
    ///
    /// Records from `newer` replace existing records for the same round.
    pub fn merge(&mut self, newer: Dataset) {
        if newer.is_empty() {
            return;
        }
        let existing = std::mem::take(&mut self.records);
        *self = Self::from_records(existing.into_iter().chain(newer.records));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn min_round(&self) -> Option<u32> {
        self.records.first().map(DrawRecord::round)
    }

    pub fn max_round(&self) -> Option<u32> {
        self.records.last().map(DrawRecord::round)
    }

    /// Most recent record, if any.
    pub fn latest(&self) -> Option<&DrawRecord> {
        self.records.last()
    }

    pub fn get(&self, round: u32) -> Option<&DrawRecord> {
        self.records
            .binary_search_by_key(&round, DrawRecord::round)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[DrawRecord] {
        &self.records
    }

    /// Rounds between the first and last record that are not present.
    pub fn missing_rounds(&self) -> Vec<u32> {
        let mut missing = Vec::new();
        for pair in self.records.windows(2) {
            missing.extend(pair[0].round() + 1..pair[1].round());
        }
        missing
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DrawRecord;
    type IntoIter = std::slice::Iter<'a, DrawRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
