//! SEO Audit: a crawling audit engine for on-page and technical SEO
//!
//! This crate crawls a bounded (or whole-site) set of pages from a root URL,
//! scores every page against a fixed rule set and aggregates the results into
//! an analysis report. Audits run as background jobs that can be polled,
//! cancelled, and queried for their report once complete.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod jobs;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for audit engine operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Frontier error: {0}")]
    Frontier(String),

    #[error("Storage error: {0}")]
    Storage(#[from] cache::StorageError),

    #[error("Audit cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for audit engine operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analyzer::{analyze, AnalysisResult, Issue, PageResult, Severity};
pub use config::{EngineConfig, JobConfig};
pub use jobs::{JobId, JobOrchestrator, JobStatus, JobStatusView};
pub use url::{extract_domain, is_same_site, normalize_url};
