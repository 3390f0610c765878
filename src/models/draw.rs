//! Draw record data structure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Smallest number that can be drawn.
pub const MIN_NUMBER: u8 = 1;

/// Largest number that can be drawn.
pub const MAX_NUMBER: u8 = 45;

/// The outcome of one weekly draw.
///
/// Fields are private: a record is validated once at construction and never
/// changes afterwards. Decoding from the cache goes through the same
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDrawRecord")]
pub struct DrawRecord {
    round: u32,
    date: NaiveDate,
    /// Winning numbers, ascending
    numbers: [u8; 6],
    bonus: u8,
}

/// Unchecked wire shape of [`DrawRecord`].
#[derive(Deserialize)]
struct RawDrawRecord {
    round: u32,
    date: NaiveDate,
    numbers: [u8; 6],
    bonus: u8,
}

impl TryFrom<RawDrawRecord> for DrawRecord {
    type Error = AppError;

    fn try_from(raw: RawDrawRecord) -> Result<Self> {
        DrawRecord::new(raw.round, raw.date, raw.numbers, raw.bonus)
    }
}

impl DrawRecord {
    /// Build a record, rejecting out-of-range or repeated numbers.
    pub fn new(round: u32, date: NaiveDate, numbers: [u8; 6], bonus: u8) -> Result<Self> {
        if round == 0 {
            return Err(AppError::validation("round must be >= 1"));
        }

        let in_range = |n: u8| (MIN_NUMBER..=MAX_NUMBER).contains(&n);
        if let Some(n) = numbers.iter().copied().find(|&n| !in_range(n)) {
            return Err(AppError::validation(format!(
                "round {round}: winning number {n} outside {MIN_NUMBER}-{MAX_NUMBER}"
            )));
        }
        if !in_range(bonus) {
            return Err(AppError::validation(format!(
                "round {round}: bonus number {bonus} outside {MIN_NUMBER}-{MAX_NUMBER}"
            )));
        }

        let mut sorted = numbers;
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(AppError::validation(format!(
                "round {round}: winning numbers are not distinct"
            )));
        }
        if sorted.contains(&bonus) {
            return Err(AppError::validation(format!(
                "round {round}: bonus number {bonus} repeats a winning number"
            )));
        }

        Ok(Self {
            round,
            date,
            numbers: sorted,
            bonus,
        })
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Winning numbers in ascending order.
    pub fn numbers(&self) -> &[u8; 6] {
        &self.numbers
    }

    pub fn bonus(&self) -> u8 {
        self.bonus
    }
}
