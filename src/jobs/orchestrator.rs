//! Job Orchestrator
//!
//! Owns the job lifecycle: submission, background execution of the crawl
//! coordinator, status snapshots, cancellation and report retrieval.

use crate::analyzer::{AnalysisResult, PageResult, SerpComparison};
use crate::cache::{CacheStats, CacheStore, StorageError};
use crate::config::{validate_job_request, EngineConfig, JobConfig, ValidatedRequest};
use crate::crawler::{build_http_client, Coordinator, CrawlContext, CrawlOutcome, Progress, ProgressSink};
use crate::jobs::limiter::SubmissionLimiter;
use crate::jobs::store::{InMemoryJobStore, JobStore};
use crate::jobs::types::{JobId, JobRecord, JobStatus, JobStatusView};
use crate::state::CrawlPhase;
use crate::AuditError;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Time budgeted per page on top of the politeness delay
const PER_PAGE_ESTIMATE: Duration = Duration::from_secs(1);

/// Errors returned by `submit`
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Too many submissions, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Failed to record job: {0}")]
    Storage(String),
}

/// Errors returned by job queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job is not completed (status: {status})")]
    NotReady { status: JobStatus },
}

/// A job accepted by `submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub id: JobId,
    pub estimated_duration: Duration,
}

/// Runs audit jobs and answers queries about them
pub struct JobOrchestrator {
    context: CrawlContext,
    store: Arc<dyn JobStore>,
    limiter: Option<SubmissionLimiter>,
    cancel_tokens: Arc<DashMap<JobId, CancellationToken>>,
}

impl JobOrchestrator {
    /// Creates an orchestrator with an in-memory job store
    pub fn new(config: EngineConfig, cache: Arc<dyn CacheStore>) -> Result<Self, AuditError> {
        Self::with_store(config, cache, Arc::new(InMemoryJobStore::new()))
    }

    /// Creates an orchestrator backed by the given job store
    ///
    /// Cache records older than the configured cleanup age are purged here.
    pub fn with_store(
        config: EngineConfig,
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn JobStore>,
    ) -> Result<Self, AuditError> {
        let client = build_http_client(&config.fetcher, &config.user_agent)?;

        let cutoff = Utc::now() - chrono::Duration::days(config.cache.cleanup_days);
        match cache.purge_older_than(cutoff) {
            Ok(0) => {}
            Ok(removed) => info!("Purged {} cache records older than {}", removed, cutoff),
            Err(e) => warn!("Cache cleanup failed: {}", e),
        }

        let limiter = config.rate_limit.as_ref().map(SubmissionLimiter::new);

        Ok(Self {
            context: CrawlContext {
                engine: Arc::new(config),
                client,
                cache,
            },
            store,
            limiter,
            cancel_tokens: Arc::new(DashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.context.engine
    }

    /// Job configuration built from the engine defaults
    pub fn default_job_config(&self) -> JobConfig {
        JobConfig::from_limits(&self.context.engine.limits)
    }

    /// Submits an audit job
    ///
    /// The job record is stored before this returns, so the id can be
    /// queried immediately. The crawl itself runs on a spawned task; this
    /// must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `target` - Root URL to audit
    /// * `keyword` - Optional target keyword
    /// * `config` - Per-job settings, validated against the engine limits
    pub fn submit(
        &self,
        target: &str,
        keyword: Option<&str>,
        config: JobConfig,
    ) -> Result<Submission, SubmitError> {
        let request = validate_job_request(target, keyword, &config, &self.context.engine.limits)
            .map_err(|e| match e {
                AuditError::Validation(msg) => SubmitError::Validation(msg),
                other => SubmitError::Validation(other.to_string()),
            })?;

        if let Some(limiter) = &self.limiter {
            limiter
                .try_acquire(Instant::now())
                .map_err(|retry_after| SubmitError::RateLimited { retry_after })?;
        }

        let id = JobId::new();
        let record = JobRecord::new(
            id,
            request.target.to_string(),
            request.keyword.clone(),
            request.config.clone(),
        );
        self.store
            .create(record)
            .map_err(|e| SubmitError::Storage(e.to_string()))?;

        let estimated_duration = self.estimate_duration(&request.config);
        info!(
            "Job {} queued for {} (estimated {}s)",
            id,
            request.target,
            estimated_duration.as_secs()
        );

        let cancel = CancellationToken::new();
        self.cancel_tokens.insert(id, cancel.clone());

        let context = self.context.clone();
        let store = Arc::clone(&self.store);
        let tokens = Arc::clone(&self.cancel_tokens);
        tokio::spawn(async move {
            run_job(id, request, context, store, cancel).await;
            tokens.remove(&id);
        });

        Ok(Submission {
            id,
            estimated_duration,
        })
    }

    /// Pages × (politeness delay + 1s) / concurrency
    fn estimate_duration(&self, config: &JobConfig) -> Duration {
        let engine = &self.context.engine;
        let pages = config.page_cap(&engine.limits) as u32;
        let per_page = engine.fetcher.politeness_delay() + PER_PAGE_ESTIMATE;
        per_page * pages / config.concurrency.max(1) as u32
    }

    /// Point-in-time status of a job
    pub fn status(&self, id: &JobId) -> Result<JobStatusView, QueryError> {
        self.store
            .snapshot(id)
            .map(|job| job.view(Utc::now()))
            .ok_or(QueryError::NotFound(*id))
    }

    /// Requests cancellation of a job
    ///
    /// The job is marked cancelled immediately; fetches already in flight
    /// finish in the background. A no-op for jobs that already ended.
    pub fn cancel(&self, id: &JobId) -> Result<(), QueryError> {
        let snapshot = self.store.snapshot(id).ok_or(QueryError::NotFound(*id))?;
        if snapshot.status.is_terminal() {
            debug!("Cancel of job {} ignored, already {}", id, snapshot.status);
            return Ok(());
        }

        if let Some(token) = self.cancel_tokens.get(id) {
            token.cancel();
        }

        let updated = self.store.update(id, &mut |job| {
            job.transition(JobStatus::Cancelled);
        });
        if let Some(job) = updated {
            info!("Job {} {}", id, job.status);
        }
        Ok(())
    }

    /// Analysis result of a completed job
    pub fn report(&self, id: &JobId) -> Result<AnalysisResult, QueryError> {
        let job = self.store.snapshot(id).ok_or(QueryError::NotFound(*id))?;
        match (&job.status, &job.result) {
            (JobStatus::Completed, Some(result)) => Ok(result.clone()),
            (status, _) => Err(QueryError::NotReady { status: *status }),
        }
    }

    /// Pages a cancelled job finished before it stopped
    pub fn diagnostics(&self, id: &JobId) -> Result<Vec<PageResult>, QueryError> {
        self.store
            .snapshot(id)
            .map(|job| job.partial_results.clone())
            .ok_or(QueryError::NotFound(*id))
    }

    /// Merges an externally produced SERP comparison into a completed report
    pub fn attach_serp(&self, id: &JobId, serp: SerpComparison) -> Result<(), QueryError> {
        let job = self.store.snapshot(id).ok_or(QueryError::NotFound(*id))?;
        if job.status != JobStatus::Completed {
            return Err(QueryError::NotReady { status: job.status });
        }

        self.store.update(id, &mut |job| {
            if let Some(result) = job.result.as_mut() {
                result.serp = Some(serp.clone());
            }
        });
        Ok(())
    }

    pub fn cache_stats(&self) -> Result<CacheStats, StorageError> {
        self.context.cache.stats()
    }

    /// Removes every cache record; later jobs re-fetch everything
    pub fn clear_cache(&self) -> Result<usize, StorageError> {
        let removed = self.context.cache.clear()?;
        info!("Cleared {} cache records", removed);
        Ok(removed)
    }
}

/// Writes crawl progress into the job record
struct JobProgress {
    id: JobId,
    store: Arc<dyn JobStore>,
}

impl ProgressSink for JobProgress {
    fn on_progress(&self, progress: Progress) {
        self.store.update(&self.id, &mut |job| {
            if job.status == JobStatus::Running {
                job.progress = progress;
            }
        });
    }

    fn on_phase(&self, phase: CrawlPhase) {
        debug!("Job {} entered {}", self.id, phase);
    }
}

async fn run_job(
    id: JobId,
    request: ValidatedRequest,
    context: CrawlContext,
    store: Arc<dyn JobStore>,
    cancel: CancellationToken,
) {
    let started = store.update(&id, &mut |job| {
        job.transition(JobStatus::Running);
    });
    match started {
        Some(job) if job.status == JobStatus::Running => {
            info!("Job {} running: {}", id, job.target);
        }
        Some(job) => {
            debug!("Job {} not started, already {}", id, job.status);
            return;
        }
        None => {
            error!("Job {} disappeared from the store before starting", id);
            return;
        }
    }

    let sink = Arc::new(JobProgress {
        id,
        store: Arc::clone(&store),
    });
    let coordinator = Coordinator::new(
        request.target,
        request.keyword,
        &request.config,
        &context,
        cancel,
        sink,
    );

    match coordinator.run().await {
        Ok(CrawlOutcome::Completed(result)) => {
            let pages = result.pages.len();
            let score = result.overall_score;
            let mut result = Some(result);
            let updated = store.update(&id, &mut |job| {
                if let Some(result) = result.take() {
                    job.complete(result);
                }
            });
            match updated {
                Some(job) if job.status == JobStatus::Completed => {
                    info!("Job {} completed: {} pages, score {}", id, pages, score)
                }
                Some(job) => debug!("Job {} finished after it was {}", id, job.status),
                None => error!("Job {} disappeared from the store", id),
            }
        }
        Ok(CrawlOutcome::Cancelled { partial }) => {
            let kept = partial.len();
            let mut partial = Some(partial);
            store.update(&id, &mut |job| {
                job.cancel(partial.take().unwrap_or_default());
            });
            info!("Job {} cancelled, {} partial pages kept for diagnostics", id, kept);
        }
        Err(e) => {
            let message = e.to_string();
            let updated = store.update(&id, &mut |job| {
                job.fail(message.clone());
            });
            match updated {
                Some(job) if job.status == JobStatus::Failed => {
                    error!("Job {} failed: {}", id, message)
                }
                _ => debug!("Job {} errored after it ended: {}", id, message),
            }
        }
    }
}
