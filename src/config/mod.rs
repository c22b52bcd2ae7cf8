//! Configuration module
//!
//! Engine-wide settings are loaded from a TOML file and validated once at
//! load time. Per-audit settings travel as a [`JobConfig`] that is validated
//! against the engine limits when a job is submitted.
//!
//! # Example
//!
//! ```no_run
//! use seo_audit::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("audit.toml")).unwrap();
//! println!("Fetch timeout: {}s", config.fetcher.timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CacheConfig, EngineConfig, FetcherConfig, JobConfig, LimitsConfig, RateLimitConfig,
    UserAgentConfig,
};

pub use parser::{load_config, parse_config};
pub use validation::{validate_job_request, ValidatedRequest};
