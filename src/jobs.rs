//! Job/status store: one job row per quote run, an append-only event log,
//! and a poll loop that waits for a terminal status.
//!
//! The pipeline writes through the [`JobStore`] trait; whoever shows progress
//! polls [`JobStore::snapshot`] on a fixed timer. There is no backoff and no
//! push channel: a snapshot is cheap, and a fixed 1.5 s cadence is what the
//! status screen has always used.
//!
//! [`InMemoryJobStore`] backs the CLI and the tests. A database-backed store
//! only needs to implement the four trait methods.

use crate::error::QuoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::Stream;
use tracing::debug;
use uuid::Uuid;

/// Default polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Lifecycle of a job. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One progress line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub ts: DateTime<Utc>,
    /// Pipeline stage, e.g. `ocr` or `pricing`.
    pub step: String,
    pub message: String,
    /// 0–100, when the stage knows.
    pub progress: Option<u8>,
}

/// A job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub quote_id: Option<String>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a poller sees: the job row plus its events, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job: Job,
    pub events: Vec<JobEvent>,
}

impl JobSnapshot {
    /// The serialized quote, once the job has succeeded.
    pub fn result(&self) -> Option<&Value> {
        self.job.result.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.job.status.is_terminal()
    }

    /// Highest progress figure reported so far.
    pub fn progress(&self) -> Option<u8> {
        self.events.iter().filter_map(|e| e.progress).max()
    }
}

/// Where job rows and events live.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a running job and return its id.
    async fn init_job(&self, quote_id: Option<&str>) -> Result<String, QuoteError>;

    /// Append an event. `progress` is clamped to 100.
    async fn log_event(
        &self,
        job_id: &str,
        step: &str,
        message: &str,
        progress: Option<u8>,
    ) -> Result<(), QuoteError>;

    /// Move a running job to a terminal status.
    async fn end_job(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
        result: Option<Value>,
    ) -> Result<(), QuoteError>;

    async fn snapshot(&self, job_id: &str) -> Result<JobSnapshot, QuoteError>;
}

struct JobRecord {
    job: Job,
    events: Vec<JobEvent>,
}

/// Process-local job store.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs ever created.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn not_found(job_id: &str) -> QuoteError {
    QuoteError::JobNotFound {
        job_id: job_id.to_string(),
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn init_job(&self, quote_id: Option<&str>) -> Result<String, QuoteError> {
        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let job = Job {
            job_id: job_id.clone(),
            quote_id: quote_id.map(str::to_string),
            status: JobStatus::Running,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.insert(
            job_id.clone(),
            JobRecord {
                job,
                events: Vec::new(),
            },
        );
        debug!("Job {} started", job_id);
        Ok(job_id)
    }

    async fn log_event(
        &self,
        job_id: &str,
        step: &str,
        message: &str,
        progress: Option<u8>,
    ) -> Result<(), QuoteError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;
        let ts = Utc::now();
        record.events.push(JobEvent {
            ts,
            step: step.to_string(),
            message: message.to_string(),
            progress: progress.map(|p| p.min(100)),
        });
        record.job.updated_at = ts;
        Ok(())
    }

    async fn end_job(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
        result: Option<Value>,
    ) -> Result<(), QuoteError> {
        if !status.is_terminal() {
            return Err(QuoteError::Internal(format!(
                "end_job needs a terminal status, got {status}"
            )));
        }
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;
        if record.job.status.is_terminal() {
            return Err(QuoteError::JobAlreadyFinished {
                job_id: job_id.to_string(),
                status: record.job.status.to_string(),
            });
        }
        record.job.status = status;
        record.job.error = error;
        record.job.result = result;
        record.job.updated_at = Utc::now();
        debug!("Job {} ended: {}", job_id, status);
        Ok(())
    }

    async fn snapshot(&self, job_id: &str) -> Result<JobSnapshot, QuoteError> {
        let jobs = self.jobs.read().await;
        let record = jobs.get(job_id).ok_or_else(|| not_found(job_id))?;
        let mut events = record.events.clone();
        events.sort_by_key(|e| e.ts);
        Ok(JobSnapshot {
            job: record.job.clone(),
            events,
        })
    }
}

// ── Polling ──────────────────────────────────────────────────────────────

/// Poll every `interval` until the job is terminal.
///
/// The first poll is immediate. Gives up with
/// [`QuoteError::PollingExhausted`] after `max_polls` non-terminal snapshots.
pub async fn poll_until_terminal(
    store: &dyn JobStore,
    job_id: &str,
    interval: Duration,
    max_polls: u32,
) -> Result<JobSnapshot, QuoteError> {
    for poll in 0..max_polls {
        if poll > 0 {
            tokio::time::sleep(interval).await;
        }
        let snapshot = store.snapshot(job_id).await?;
        if snapshot.is_terminal() {
            return Ok(snapshot);
        }
    }
    Err(QuoteError::PollingExhausted {
        job_id: job_id.to_string(),
        polls: max_polls,
    })
}

/// A boxed stream of job snapshots.
pub type JobStream = Pin<Box<dyn Stream<Item = Result<JobSnapshot, QuoteError>> + Send>>;

/// Snapshots on a fixed timer, ending after the first terminal snapshot or
/// the first error.
pub fn watch_job(store: Arc<dyn JobStore>, job_id: impl Into<String>, interval: Duration) -> JobStream {
    let job_id = job_id.into();
    let ticks = IntervalStream::new(tokio::time::interval(interval));
    let snapshots = ticks
        .then(move |_| {
            let store = Arc::clone(&store);
            let job_id = job_id.clone();
            async move { store.snapshot(&job_id).await }
        })
        .scan(false, |done, item| {
            if *done {
                return futures::future::ready(None);
            }
            *done = item.as_ref().map(JobSnapshot::is_terminal).unwrap_or(true);
            futures::future::ready(Some(item))
        });
    Box::pin(snapshots)
}
