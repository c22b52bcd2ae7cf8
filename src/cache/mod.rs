//! Persistent page cache
//!
//! This module maps a normalized URL to its last fetched content:
//! - SQLite database initialization and schema management
//! - Raw body, HTTP status and fetch timestamp per URL
//! - A SHA-256 digest of the body and optional derived metrics
//! - Record counts, age range and cleanup
//!
//! Staleness is decided by the caller from `fetched_at`; the store itself is
//! a plain key-value layer.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteCacheStore;
pub use traits::{CacheStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

/// Opens (or creates) the cache database at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteCacheStore)` - Successfully opened cache
/// * `Err(StorageError)` - The database could not be opened or initialized
pub fn open_cache(path: &Path) -> StorageResult<SqliteCacheStore> {
    SqliteCacheStore::new(path)
}

/// The last fetched content for one normalized URL
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub url: String,

    /// URL the body was served from after redirects
    pub final_url: String,

    pub body: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub load_time: Duration,
    pub fetched_at: DateTime<Utc>,

    /// Hex-encoded SHA-256 of `body`
    pub content_hash: String,

    /// Serialized page metrics, when the page has been analyzed
    pub metrics: Option<String>,
}

impl CacheRecord {
    /// Builds a record for a fresh network fetch, stamped with the current time
    pub fn new(
        url: &str,
        body: String,
        status_code: u16,
        content_type: Option<String>,
        load_time: Duration,
    ) -> Self {
        let content_hash = content_hash(&body);
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            body,
            status_code,
            content_type,
            load_time,
            fetched_at: Utc::now(),
            content_hash,
            metrics: None,
        }
    }

    /// Sets the post-redirect URL the body was served from
    pub fn with_final_url(mut self, final_url: &str) -> Self {
        self.final_url = final_url.to_string();
        self
    }

    /// A record is stale once it is older than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.fetched_at > max_age
    }
}

/// Summary of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub count: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Hex-encoded SHA-256 digest of a page body
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
