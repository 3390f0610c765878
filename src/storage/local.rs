//! Local filesystem snapshot cache.
//!
//! Writes go to a temporary file in the cache directory which is then renamed
//! over the snapshot, so concurrent readers in other processes see either the
//! old or the new snapshot, never a partial one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CacheConfig, Dataset};
use crate::storage::{CacheSnapshot, CacheStore, SaveSummary};
use crate::utils::{Clock, SystemClock};

/// Distinguishes temp files of concurrent saves within one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem cache backend.
#[derive(Clone)]
pub struct LocalCacheStore {
    root_dir: PathBuf,
    file_name: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl LocalCacheStore {
    /// Create a store rooted at the given directory with default settings.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&CacheConfig {
            dir: root_dir.into(),
            ..CacheConfig::default()
        })
    }

    /// Create a store from the cache section of the configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            root_dir: config.dir.clone(),
            file_name: config.file_name.clone(),
            ttl: config.ttl(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for timestamps and TTL checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Full path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.root_dir.join(&self.file_name)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root_dir.join(format!(
            ".{}.{}.{}.tmp",
            self.file_name,
            std::process::id(),
            seq
        ));
        let mut file = tokio::fs::File::create(&tmp).await?;
        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read and decode the snapshot, `Ok(None)` if the file doesn't exist.
    async fn read_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        let path = self.snapshot_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };

        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;
        if !snapshot.is_consistent() {
            return Err(AppError::validation(format!(
                "total_rounds is {} but snapshot holds {} records",
                snapshot.total_rounds,
                snapshot.data.len()
            )));
        }
        Ok(Some(snapshot))
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn save(&self, dataset: &Dataset) -> Result<SaveSummary> {
        let now = self.clock.now();
        let snapshot = CacheSnapshot::new(dataset.clone(), now);
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let path = self.snapshot_path();
        self.write_bytes(&path, &bytes).await?;
        log::info!(
            "Cache: {} rounds written to {}",
            snapshot.total_rounds,
            path.display()
        );

        Ok(SaveSummary {
            total_rounds: snapshot.total_rounds,
            timestamp: now,
            location: path,
        })
    }

    async fn load(&self) -> Option<CacheSnapshot> {
        let snapshot = self.inspect().await?;
        let age = snapshot.age(self.clock.now());
        if age > self.ttl {
            log::info!(
                "Cache is {}h old (limit {}h); ignoring it",
                age.num_hours(),
                self.ttl.num_hours()
            );
            return None;
        }
        Some(snapshot)
    }

    async fn inspect(&self) -> Option<CacheSnapshot> {
        match self.read_snapshot().await {
            Ok(Some(snapshot)) => Some(snapshot),
            Ok(None) => {
                log::debug!("No cache found at {}", self.snapshot_path().display());
                None
            }
            Err(e) => {
                log::warn!(
                    "Cache at {} is unreadable: {}",
                    self.snapshot_path().display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_record;
    use crate::utils::FixedClock;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap(),
        ))
    }

    fn dataset(start: u32, end: u32) -> Dataset {
        (start..=end).map(sample_record).collect()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let clock = fixed_clock();
        let store = LocalCacheStore::new(tmp.path()).with_clock(clock.clone());

        let summary = store.save(&dataset(1, 10)).await.unwrap();
        assert_eq!(summary.total_rounds, 10);
        assert_eq!(summary.timestamp, clock.now());

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.total_rounds, 10);
        assert_eq!(snapshot.max_round(), Some(10));
        assert_eq!(snapshot.last_updated, clock.now());
        assert_eq!(snapshot.data, dataset(1, 10));
    }

    #[tokio::test]
    async fn test_file_format() {
        let tmp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        store.save(&dataset(1, 2)).await.unwrap();

        let raw = std::fs::read_to_string(store.snapshot_path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["total_rounds"], 2);
        assert_eq!(json["last_updated"], "2024-01-06T12:00:00Z");
        assert_eq!(json["data"][0]["round"], 1);
        assert_eq!(json["data"][0]["date"], "2002-12-07");
        assert_eq!(json["data"][0]["numbers"].as_array().unwrap().len(), 6);
        assert!(json["data"][0]["bonus"].is_u64());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(tmp.path());
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let tmp = TempDir::new().unwrap();
        let clock = fixed_clock();
        let store = LocalCacheStore::new(tmp.path()).with_clock(clock.clone());
        store.save(&dataset(1, 3)).await.unwrap();

        clock.advance(Duration::hours(24));
        assert!(store.load().await.is_some());

        clock.advance(Duration::seconds(1));
        assert!(store.load().await.is_none());

        // Stale snapshots are left on disk
        assert!(store.snapshot_path().exists());
        assert!(store.inspect().await.is_some());
    }

    #[tokio::test]
    async fn test_malformed_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        std::fs::write(store.snapshot_path(), b"{ not json").unwrap();

        assert!(store.load().await.is_none());
        assert!(store.snapshot_path().exists());
    }

    #[tokio::test]
    async fn test_inconsistent_count_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        let body = r#"{
            "data": [{"round": 1, "date": "2002-12-07", "numbers": [10, 23, 29, 33, 37, 40], "bonus": 16}],
            "last_updated": "2024-01-06T11:00:00Z",
            "total_rounds": 5
        }"#;
        std::fs::write(store.snapshot_path(), body).unwrap();

        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_record_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        let body = r#"{
            "data": [{"round": 1, "date": "2002-12-07", "numbers": [10, 23, 29, 33, 37, 99], "bonus": 16}],
            "last_updated": "2024-01-06T11:00:00Z",
            "total_rounds": 1
        }"#;
        std::fs::write(store.snapshot_path(), body).unwrap();

        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_without_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        store.save(&dataset(1, 5)).await.unwrap();
        store.save(&dataset(1, 2)).await.unwrap();

        assert_eq!(store.load().await.unwrap().total_rounds, 2);
        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_saves_from_two_stores() {
        let tmp = TempDir::new().unwrap();
        let first = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        let second = LocalCacheStore::new(tmp.path()).with_clock(fixed_clock());
        let small = dataset(1, 3);
        let large = dataset(1, 400);

        for _ in 0..20 {
            let (a, b) = tokio::join!(first.save(&small), second.save(&large));
            a.unwrap();
            b.unwrap();

            let snapshot = first.load().await.unwrap();
            assert!(snapshot.data == small || snapshot.data == large);
        }

        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_save_to_unwritable_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let store = LocalCacheStore::new(&blocker);
        assert!(store.save(&dataset(1, 2)).await.is_err());
    }
}
