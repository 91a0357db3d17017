//! In-memory job tracking for background catalog mutations.
//!
//! Each mutation request creates a job entry, dispatches the work to the
//! blocking pool and returns the opaque job id immediately; clients poll
//! the snapshot until a terminal state. The table is a [`DashMap`] keyed by
//! job id; every read or write of a job's fields happens under that entry's
//! guard, and no guard is held across disk I/O.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::publish::PublishReporter;
use crate::catalog::util::now_stamp;
use crate::errors::PublishError;
use crate::models::PublishOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Create,
    Update,
    Delete,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
struct Job {
    kind: JobKind,
    status: JobStatus,
    progress: u8,
    logs: Vec<String>,
    last_log: String,
    result: Option<PublishOutcome>,
    error: Option<JobError>,
}

impl Job {
    fn new(kind: JobKind) -> Self {
        Self {
            kind,
            status: JobStatus::Queued,
            progress: 0,
            logs: Vec::new(),
            last_log: String::new(),
            result: None,
            error: None,
        }
    }
}

/// Consistent point-in-time view of one job, taken under a single guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub last_log: String,
    pub result: Option<PublishOutcome>,
    pub error: Option<JobError>,
}

/// Concurrency-safe job table, scoped to process uptime. The only
/// persistence is the per-job report file flushed on completion.
pub struct JobStore {
    jobs: DashMap<String, Job>,
    reports_dir: PathBuf,
}

impl JobStore {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self {
            jobs: DashMap::new(),
            reports_dir,
        }
    }

    /// Register a new queued job and hand back its opaque id.
    pub fn create(&self, kind: JobKind) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
        self.jobs.insert(id.clone(), Job::new(kind));
        id
    }

    pub fn append_log(&self, job_id: &str, line: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.logs.push(line.to_string());
            job.last_log = line.to_string();
        }
    }

    pub fn set_progress(&self, job_id: &str, pct: u8) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.progress = pct.min(100);
        }
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.get(job_id).map(|job| JobSnapshot {
            status: job.status,
            progress: job.progress,
            last_log: job.last_log.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
        })
    }

    /// Full newline-joined transcript, trailing newline when non-empty.
    pub fn transcript(&self, job_id: &str) -> Option<String> {
        self.jobs.get(job_id).map(|job| {
            if job.logs.is_empty() {
                String::new()
            } else {
                format!("{}\n", job.logs.join("\n"))
            }
        })
    }

    fn mark_running(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Running;
            job.progress = 1;
        }
    }

    fn complete_success(&self, job_id: &str, outcome: PublishOutcome) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Success;
            job.result = Some(outcome);
            job.error = None;
        }
    }

    fn complete_error(&self, job_id: &str, code: &str, message: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Error;
            job.error = Some(JobError {
                code: code.to_string(),
                message: message.to_string(),
            });
        }
    }

    /// Persist the transcript to `reports/publish_{stamp}_{jobId}.log`.
    /// Failure to write the report never fails the job.
    fn flush_report(&self, job_id: &str) {
        let Some(job) = self.jobs.get(job_id) else {
            return;
        };
        let lines = job.logs.clone();
        let kind = job.kind;
        drop(job);

        let path = self
            .reports_dir
            .join(format!("publish_{}_{}.log", now_stamp(), job_id));
        let body = format!("{}\n", lines.join("\n"));
        let written = std::fs::create_dir_all(&self.reports_dir)
            .and_then(|_| std::fs::write(&path, body));
        match written {
            Ok(()) => info!(job_id, kind = kind.as_str(), report = %path.display(), "job report written"),
            Err(e) => warn!(job_id, error = %e, "failed writing job report"),
        }
    }
}

/// Bridges the mutation engine's progress/log callbacks onto one job entry.
pub struct JobReporter {
    store: Arc<JobStore>,
    job_id: String,
}

impl PublishReporter for JobReporter {
    fn log(&self, line: &str) {
        self.store.append_log(&self.job_id, line);
    }

    fn progress(&self, pct: u8) {
        self.store.set_progress(&self.job_id, pct);
    }
}

/// Run one mutation to its terminal state, recording result or error and
/// flushing the report file. Synchronous; callers put it on a worker.
pub fn run_job<F>(store: Arc<JobStore>, job_id: String, kind: JobKind, work: F)
where
    F: FnOnce(&JobReporter) -> Result<PublishOutcome, PublishError>,
{
    store.mark_running(&job_id);
    store.append_log(&job_id, &format!("Job {} start ({})", job_id, kind.as_str()));

    let reporter = JobReporter {
        store: store.clone(),
        job_id: job_id.clone(),
    };

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| work(&reporter)))
        .unwrap_or_else(|_| Err(PublishError::Internal("mutation panicked".into())));

    match outcome {
        Ok(result) => {
            store.set_progress(&job_id, 100);
            store.complete_success(&job_id, result);
            store.append_log(&job_id, "SUCCESS");
        }
        Err(err) => {
            store.complete_error(&job_id, err.code(), err.detail());
            store.append_log(&job_id, &format!("ERROR {}: {}", err.code(), err.detail()));
        }
    }

    store.flush_report(&job_id);
}

/// Create a job entry, dispatch the mutation to the blocking pool and
/// return the job id without waiting. There is no cancellation; a started
/// job runs to completion or failure.
pub fn dispatch<F>(store: Arc<JobStore>, kind: JobKind, work: F) -> String
where
    F: FnOnce(&JobReporter) -> Result<PublishOutcome, PublishError> + Send + 'static,
{
    let job_id = store.create(kind);
    let task_id = job_id.clone();
    tokio::task::spawn_blocking(move || run_job(store, task_id, kind, work));
    job_id
}
