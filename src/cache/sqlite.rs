//! SQLite cache implementation
//!
//! This module provides a SQLite-based implementation of the CacheStore trait.

use crate::cache::schema::initialize_schema;
use crate::cache::traits::{CacheStore, StorageError, StorageResult};
use crate::cache::{CacheRecord, CacheStats};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite cache backend
///
/// The connection sits behind a mutex so a single store can be shared by
/// every running job.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Creates a new SqliteCacheStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCacheStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory cache
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("cache connection lock poisoned".to_string()))
    }
}

fn millis_to_datetime(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            format!("invalid timestamp: {}", ms).into(),
        )
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CacheRecord> {
    let load_time_ms: i64 = row.get(4)?;
    let url: String = row.get(0)?;
    let final_url: Option<String> = row.get(8)?;
    Ok(CacheRecord {
        final_url: final_url.unwrap_or_else(|| url.clone()),
        url,
        body: row.get(1)?,
        status_code: row.get(2)?,
        content_type: row.get(3)?,
        load_time: Duration::from_millis(load_time_ms.max(0) as u64),
        fetched_at: millis_to_datetime(row.get(5)?)?,
        content_hash: row.get(6)?,
        metrics: row.get(7)?,
    })
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, url: &str) -> StorageResult<Option<CacheRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url, body, status_code, content_type, load_time_ms, fetched_at,
             content_hash, metrics, final_url
             FROM page_cache WHERE url = ?1",
        )?;

        let record = stmt.query_row(params![url], row_to_record).optional()?;
        Ok(record)
    }

    fn put(&self, record: &CacheRecord) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO page_cache
             (url, body, status_code, content_type, load_time_ms, fetched_at, content_hash, metrics,
              final_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.url,
                record.body,
                record.status_code,
                record.content_type,
                record.load_time.as_millis() as i64,
                record.fetched_at.timestamp_millis(),
                record.content_hash,
                record.metrics,
                record.final_url,
            ],
        )?;
        Ok(())
    }

    fn set_metrics(&self, url: &str, metrics: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE page_cache SET metrics = ?1 WHERE url = ?2",
            params![metrics, url],
        )?;
        Ok(())
    }

    fn stats(&self) -> StorageResult<CacheStats> {
        let conn = self.lock()?;
        let (count, oldest, newest): (i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MIN(fetched_at), MAX(fetched_at) FROM page_cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(CacheStats {
            count: count as u64,
            oldest: oldest.map(millis_to_datetime).transpose()?,
            newest: newest.map(millis_to_datetime).transpose()?,
        })
    }

    fn clear(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM page_cache", [])?;
        Ok(removed)
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM page_cache WHERE fetched_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(removed)
    }
}
