//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote source and HTTP settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Draw calendar used to estimate the current round
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Range loading behavior
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Snapshot cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// How many rounds each manager operation loads
    #[serde(default)]
    pub dataset: DatasetConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        Url::parse(&self.source.base_url)?;
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.schedule.draw_hour > 23 {
            return Err(AppError::validation("schedule.draw_hour must be 0-23"));
        }
        if self.schedule.utc_offset().is_none() {
            return Err(AppError::validation(
                "schedule.utc_offset_hours must be within -14..=14",
            ));
        }
        if self.schedule.probe_depth == 0 {
            return Err(AppError::validation("schedule.probe_depth must be > 0"));
        }
        if self.loader.max_concurrent == 0 {
            return Err(AppError::validation("loader.max_concurrent must be > 0"));
        }
        if self.cache.ttl_hours == 0 || self.cache.try_ttl().is_none() {
            return Err(AppError::validation(
                "cache.ttl_hours must be > 0 and representable as a duration",
            ));
        }
        if self.cache.file_name.trim().is_empty() {
            return Err(AppError::validation("cache.file_name is empty"));
        }
        if self.dataset.initial_count == 0 {
            return Err(AppError::validation("dataset.initial_count must be > 0"));
        }
        Ok(())
    }
}

/// Remote source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Endpoint queried with `method=getLottoNumber&drwNo={round}`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Weekly draw calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Date of round 1
    #[serde(default = "defaults::epoch_date")]
    pub epoch_date: NaiveDate,

    /// Weekday of the draw, local time
    #[serde(default = "defaults::draw_weekday")]
    pub draw_weekday: Weekday,

    /// Hour from which the day's draw is assumed published, local time
    #[serde(default = "defaults::draw_hour")]
    pub draw_hour: u32,

    /// Offset of the draw's local time from UTC
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Number of candidate rounds probed when verifying the estimate
    #[serde(default = "defaults::probe_depth")]
    pub probe_depth: u32,

    /// Rounds subtracted from the estimate when no probe succeeds
    #[serde(default = "defaults::fallback_margin")]
    pub fallback_margin: u32,
}

impl ScheduleConfig {
    /// Fixed offset of the draw's local time, `None` if out of range.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        if !(-14..=14).contains(&self.utc_offset_hours) {
            return None;
        }
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            epoch_date: defaults::epoch_date(),
            draw_weekday: defaults::draw_weekday(),
            draw_hour: defaults::draw_hour(),
            utc_offset_hours: defaults::utc_offset_hours(),
            probe_depth: defaults::probe_depth(),
            fallback_margin: defaults::fallback_margin(),
        }
    }
}

/// Range loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Maximum rounds fetched at the same time (1 = sequential)
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each completed fetch in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Stop issuing fetches once a batch has run this long
    #[serde(default)]
    pub batch_timeout_secs: Option<u64>,
}

impl LoaderConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            batch_timeout_secs: None,
        }
    }
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the snapshot file
    #[serde(default = "defaults::cache_dir")]
    pub dir: PathBuf,

    /// Snapshot file name inside `dir`
    #[serde(default = "defaults::cache_file_name")]
    pub file_name: String,

    /// Age after which a snapshot is ignored
    #[serde(default = "defaults::ttl_hours")]
    pub ttl_hours: u64,

    /// Rounds a snapshot may lag the verified latest round and still be used
    #[serde(default = "defaults::staleness_tolerance")]
    pub staleness_tolerance: u32,
}

impl CacheConfig {
    /// Snapshot TTL, `None` if `ttl_hours` does not fit a `TimeDelta`.
    pub fn try_ttl(&self) -> Option<TimeDelta> {
        i64::try_from(self.ttl_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
    }

    /// Snapshot TTL, saturating at the largest representable span.
    pub fn ttl(&self) -> TimeDelta {
        self.try_ttl().unwrap_or(TimeDelta::MAX)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: defaults::cache_dir(),
            file_name: defaults::cache_file_name(),
            ttl_hours: defaults::ttl_hours(),
            staleness_tolerance: defaults::staleness_tolerance(),
        }
    }
}

/// Batch sizes for manager operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Rounds loaded on a cold start
    #[serde(default = "defaults::initial_count")]
    pub initial_count: u32,

    /// Rounds added by a regular backfill
    #[serde(default = "defaults::extend_count")]
    pub extend_count: u32,

    /// Rounds added by a large backfill
    #[serde(default = "defaults::extend_large_count")]
    pub extend_large_count: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            initial_count: defaults::initial_count(),
            extend_count: defaults::extend_count(),
            extend_large_count: defaults::extend_large_count(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use chrono::{NaiveDate, Weekday};

    // Source defaults
    pub fn base_url() -> String {
        "https://www.dhlottery.co.kr/common.do".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; lotto-archive/0.1)".into()
    }
    pub fn timeout() -> u64 {
        5
    }

    // Schedule defaults (Saturday 21:00 KST, first draw 2002-12-07)
    pub fn epoch_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2002, 12, 7).unwrap_or_default()
    }
    pub fn draw_weekday() -> Weekday {
        Weekday::Sat
    }
    pub fn draw_hour() -> u32 {
        21
    }
    pub fn utc_offset_hours() -> i32 {
        9
    }
    pub fn probe_depth() -> u32 {
        4
    }
    pub fn fallback_margin() -> u32 {
        2
    }

    // Loader defaults
    pub fn max_concurrent() -> usize {
        1
    }

    // Cache defaults
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn cache_file_name() -> String {
        "lotto_cache.json".into()
    }
    pub fn ttl_hours() -> u64 {
        24
    }
    pub fn staleness_tolerance() -> u32 {
        5
    }

    // Dataset defaults
    pub fn initial_count() -> u32 {
        100
    }
    pub fn extend_count() -> u32 {
        200
    }
    pub fn extend_large_count() -> u32 {
        500
    }
}
