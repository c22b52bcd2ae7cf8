//! Audit jobs
//!
//! A job is one audit run. The [`JobOrchestrator`] records a job before
//! handing out its id, runs its crawl on a background task and serves status
//! and report queries from atomically swapped snapshots.
//!
//! # Example
//!
//! ```no_run
//! use seo_audit::cache::SqliteCacheStore;
//! use seo_audit::{EngineConfig, JobOrchestrator, JobStatus};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(SqliteCacheStore::new_in_memory()?);
//! let orchestrator = JobOrchestrator::new(EngineConfig::default(), cache)?;
//!
//! let job = orchestrator.default_job_config();
//! let submission = orchestrator.submit("https://example.com", Some("widgets"), job)?;
//!
//! while !orchestrator.status(&submission.id)?.status.is_terminal() {
//!     tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//! }
//! if orchestrator.status(&submission.id)?.status == JobStatus::Completed {
//!     let report = orchestrator.report(&submission.id)?;
//!     println!("Overall score: {}", report.overall_score);
//! }
//! # Ok(())
//! # }
//! ```

mod limiter;
mod orchestrator;
mod store;
mod types;

pub use limiter::SubmissionLimiter;
pub use orchestrator::{JobOrchestrator, QueryError, SubmitError, Submission};
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use types::{JobId, JobRecord, JobStatus, JobStatusView, ProgressView};
