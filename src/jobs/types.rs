use crate::analyzer::{AnalysisResult, PageResult};
use crate::config::JobConfig;
use crate::crawler::Progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of one audit run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a job
///
/// Legal transitions: `Queued -> Running -> {Completed, Failed}`, and any
/// non-terminal status to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Queued, Running) => true,
            (Running, Completed) | (Running, Failed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored state of one job
///
/// `result` is set only when the status is `Completed` and `error` only when
/// it is `Failed`; the update helpers below keep the two in step.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub target: String,
    pub keyword: Option<String>,
    pub config: JobConfig,
    pub status: JobStatus,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,

    /// Pages finished before a cancellation, kept for diagnostics only
    pub partial_results: Vec<PageResult>,
}

impl JobRecord {
    pub fn new(id: JobId, target: String, keyword: Option<String>, config: JobConfig) -> Self {
        Self {
            id,
            target,
            keyword,
            config,
            status: JobStatus::Queued,
            progress: Progress::default(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            partial_results: Vec::new(),
        }
    }

    /// Moves to `next` if the transition is legal; returns whether it did
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        match next {
            JobStatus::Running => self.started_at = Some(now),
            _ if next.is_terminal() => self.finished_at = Some(now),
            _ => {}
        }
        self.status = next;
        true
    }

    pub fn complete(&mut self, result: AnalysisResult) -> bool {
        if !self.transition(JobStatus::Completed) {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub fn fail(&mut self, error: String) -> bool {
        if !self.transition(JobStatus::Failed) {
            return false;
        }
        self.error = Some(error);
        true
    }

    /// Records a cancelled crawl and its partial pages
    ///
    /// The record may already be `Cancelled` from an earlier `cancel`
    /// request; the partial pages are attached either way. Returns false when
    /// the job had already completed or failed.
    pub fn cancel(&mut self, partial: Vec<PageResult>) -> bool {
        self.transition(JobStatus::Cancelled);
        if self.status != JobStatus::Cancelled {
            return false;
        }
        self.partial_results = partial;
        true
    }

    /// Builds the read-side view of this record
    pub fn view(&self, now: DateTime<Utc>) -> JobStatusView {
        let end = self.finished_at.unwrap_or(now);
        let elapsed_ms = self
            .started_at
            .map(|start| (end - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0);

        JobStatusView {
            id: self.id,
            target: self.target.clone(),
            status: self.status,
            progress: ProgressView {
                step: self.progress.current_step,
                total: self.progress.total_steps,
                percent: self.progress.percentage,
                elapsed_ms,
            },
            error: self.error.clone(),
            created_at: self.created_at,
        }
    }
}

/// Progress as reported to status callers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    pub step: usize,
    pub total: usize,
    pub percent: f64,
    pub elapsed_ms: u64,
}

/// Point-in-time status of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub target: String,
    pub status: JobStatus,
    pub progress: ProgressView,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
