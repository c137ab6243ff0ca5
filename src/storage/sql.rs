// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite backend for the local store.
//!
//! Schema:
//! ```sql
//! CREATE TABLE gps_data (
//!   id INTEGER PRIMARY KEY AUTOINCREMENT,
//!   lat REAL, lon REAL, altitude REAL, accuracy REAL,
//!   timestamp TEXT, speed REAL, bearing REAL
//! )
//! ```
//!
//! `AUTOINCREMENT` guarantees ids are never reused, which is what lets
//! [`LocalStore::clear`] delete by watermark without touching rows that
//! were appended while a drain was in flight.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::resilience::retry::{retry, RetryConfig};
use crate::sample::PositionSample;
use super::traits::{LocalStore, RowId, StorageError, StoredSample};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS gps_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lat REAL,
        lon REAL,
        altitude REAL,
        accuracy REAL,
        timestamp TEXT,
        speed REAL,
        bearing REAL
    )
"#;

const INSERT_SAMPLE: &str =
    "INSERT INTO gps_data (lat, lon, altitude, accuracy, timestamp, speed, bearing) VALUES (?, ?, ?, ?, ?, ?, ?)";

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

pub struct SqliteStore {
    pool: SqlitePool,
    path: String,
}

impl SqliteStore {
    /// Open (creating if missing) the SQLite file at `path`.
    ///
    /// Uses startup-mode retry so a briefly unavailable disk does not kill
    /// the process, but a wrong path still fails within a few seconds.
    /// The schema is not touched; call [`LocalStore::init`] next.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = retry("sqlite_connect", &RetryConfig::startup(), || {
            let options = options.clone();
            let path_str = path_str.clone();
            async move {
                SqlitePoolOptions::new()
                    // One writer; connections are acquired per call and released after.
                    .max_connections(1)
                    .acquire_timeout(Duration::from_secs(10))
                    .idle_timeout(Duration::from_secs(300))
                    .connect_with(options)
                    .await
                    .map_err(|e| StorageError::Init(format!("{}: {}", path_str, e)))
            }
        })
        .await?;

        Ok(Self { pool, path: path_str })
    }

    /// Connect and create the schema in one step.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let store = Self::connect(path).await?;
        store.init().await?;
        Ok(store)
    }

    /// Path to the SQLite file.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn init(&self) -> Result<(), StorageError> {
        retry("sqlite_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(CREATE_TABLE)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Init(e.to_string()))
        })
        .await?;
        debug!(path = %self.path, "gps_data schema ready");
        Ok(())
    }

    async fn append(&self, batch: &[PositionSample]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;
        for sample in batch {
            sqlx::query(INSERT_SAMPLE)
                .bind(sample.lat)
                .bind(sample.lon)
                .bind(sample.altitude)
                .bind(sample.accuracy)
                .bind(&sample.timestamp)
                .bind(sample.speed)
                .bind(sample.bearing)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        debug!(rows = batch.len(), "Samples appended to local store");
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<StoredSample>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, lat, lon, altitude, accuracy, timestamp, speed, bearing FROM gps_data ORDER BY id ASC"
        )
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(backend)?;
            let timestamp: Option<String> = row.try_get("timestamp").map_err(backend)?;
            stored.push(StoredSample {
                id,
                sample: PositionSample {
                    lat: row.try_get("lat").map_err(backend)?,
                    lon: row.try_get("lon").map_err(backend)?,
                    altitude: row.try_get("altitude").map_err(backend)?,
                    accuracy: row.try_get("accuracy").map_err(backend)?,
                    timestamp: timestamp.unwrap_or_default(),
                    speed: row.try_get("speed").map_err(backend)?,
                    bearing: row.try_get("bearing").map_err(backend)?,
                },
            });
        }
        Ok(stored)
    }

    async fn clear(&self, through: RowId) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM gps_data WHERE id <= ?")
            .bind(through)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM gps_data")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let count: i64 = row.try_get("cnt").map_err(backend)?;
        Ok(count as u64)
    }

    /// Truncate the SQLite WAL file so a drained store does not keep its
    /// high-water disk footprint.
    async fn compact(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("WAL checkpoint failed: {}", e)))?;
        debug!(path = %self.path, "Local store checkpoint completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fix(n: u32) -> PositionSample {
        PositionSample::at(format!("2025-01-01T00:00:{:02}.000000Z", n))
            .with_position(52.0 + n as f64, 4.0)
            .with_altitude(3.5)
            .with_accuracy(4.0)
            .with_speed(10.0)
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gps.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.init().await.unwrap();
        store.init().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_append_and_read_in_insertion_order() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("gps.db")).await.unwrap();

        store.append(&[fix(0), fix(1)]).await.unwrap();
        store.append(&[PositionSample::at("2025-01-01T00:00:02.000000Z")]).await.unwrap();

        let rows = store.read_all().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sample, fix(0));
        assert_eq!(rows[1].sample, fix(1));
        assert!(rows[2].sample.is_heartbeat());
        assert!(rows[0].id < rows[1].id && rows[1].id < rows[2].id);
    }

    #[tokio::test]
    async fn test_clear_respects_watermark() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("gps.db")).await.unwrap();

        store.append(&[fix(0), fix(1)]).await.unwrap();
        let through = store.read_all().await.unwrap().last().unwrap().id;
        store.append(&[fix(2)]).await.unwrap();

        assert_eq!(store.clear(through).await.unwrap(), 2);

        let rows = store.read_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sample, fix(2));
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gps.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.append(&[fix(0), fix(1), fix(2)]).await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_compact_after_clear() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("gps.db")).await.unwrap();

        store.append(&[fix(0)]).await.unwrap();
        store.clear(RowId::MAX).await.unwrap();
        store.compact().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_fails_for_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("gps.db");

        let result = SqliteStore::connect(&path).await;
        assert!(matches!(result, Err(StorageError::Init(_))));
    }
}
