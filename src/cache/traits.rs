//! Cache store trait and error types

use crate::cache::{CacheRecord, CacheStats};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the cache medium
///
/// Callers treat every variant as a cache miss and continue uncached.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value store from normalized URL to the last fetched content
///
/// The store knows nothing about staleness; it only keeps timestamps. One
/// instance is shared by every job, so implementations must be safe for
/// concurrent readers and writers, and a reader must never observe a
/// partially written record.
pub trait CacheStore: Send + Sync {
    /// Looks up the record for a normalized URL
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - A record exists (possibly stale)
    /// * `Ok(None)` - No record for this URL
    fn get(&self, url: &str) -> StorageResult<Option<CacheRecord>>;

    /// Inserts or replaces the record for `record.url`
    fn put(&self, record: &CacheRecord) -> StorageResult<()>;

    /// Attaches serialized page metrics to an existing record
    ///
    /// Does nothing when no record exists for the URL.
    fn set_metrics(&self, url: &str, metrics: &str) -> StorageResult<()>;

    /// Record count and age range
    fn stats(&self) -> StorageResult<CacheStats>;

    /// Removes every record, returning how many were removed
    fn clear(&self) -> StorageResult<usize>;

    /// Removes records fetched before `cutoff`, returning how many were removed
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;
}
