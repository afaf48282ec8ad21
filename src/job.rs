//! Jobs and the addressable job collection.
//!
//! A job is created by the submitter, mutated by exactly one worker
//! once dequeued, and read-only after it reaches a terminal state.
//! Mutation goes through [`JobHandle`], which enforces the terminal
//! rule.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProcess,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// Per-job pull statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pulled: u64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

/// One requested synchronization of one layer.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub layer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub status: JobStatus,
    pub message: String,
    pub stats: JobStats,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(layer: impl Into<String>, filter: Option<String>) -> Self {
        Self {
            // simple format keeps the id usable as an identifier suffix
            id: uuid::Uuid::new_v4().simple().to_string(),
            layer: layer.into(),
            filter: filter.filter(|f| !f.is_empty()),
            status: JobStatus::Queued,
            message: String::new(),
            stats: JobStats::default(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Shared handle to a job. Cloning shares the same underlying record.
#[derive(Debug, Clone)]
pub struct JobHandle {
    inner: Arc<Mutex<Job>>,
}

impl JobHandle {
    pub fn new(job: Job) -> Self {
        Self {
            inner: Arc::new(Mutex::new(job)),
        }
    }

    pub fn id(&self) -> String {
        self.inner.lock().unwrap().id.clone()
    }

    pub fn layer(&self) -> String {
        self.inner.lock().unwrap().layer.clone()
    }

    pub fn filter(&self) -> Option<String> {
        self.inner.lock().unwrap().filter.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.inner.lock().unwrap().status
    }

    /// Copy of the current record, for polling and serialization.
    pub fn snapshot(&self) -> Job {
        self.inner.lock().unwrap().clone()
    }

    pub fn set_status(&self, status: JobStatus) {
        let mut job = self.inner.lock().unwrap();
        if job.status.is_terminal() {
            return;
        }
        job.status = status;
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let mut job = self.inner.lock().unwrap();
        if job.status.is_terminal() {
            return;
        }
        job.message = message.into();
    }

    /// Transition to FINISHED, publishing the statistics atomically
    /// with the status change.
    pub fn finish(&self, stats: JobStats) {
        let mut job = self.inner.lock().unwrap();
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Finished;
        job.stats = stats;
        job.finished_at = Some(Utc::now());
    }

    /// Transition to FAILED with a human-readable message.
    pub fn fail(&self, message: impl Into<String>) {
        let mut job = self.inner.lock().unwrap();
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Failed;
        job.message = message.into();
        job.finished_at = Some(Utc::now());
    }
}

/// Job counts by status, for the status endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct JobCounts {
    pub queued: usize,
    pub in_process: usize,
    pub finished: usize,
    pub failed: usize,
}

/// Addressable collection of jobs, shared between the submitter, the
/// workers and the HTTP pollers.
#[derive(Debug, Default)]
pub struct JobList {
    jobs: Mutex<HashMap<String, JobHandle>>,
}

impl JobList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: JobHandle) {
        self.jobs.lock().unwrap().insert(job.id(), job);
    }

    pub fn get(&self, id: &str) -> Option<JobHandle> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    pub fn counts(&self) -> JobCounts {
        let jobs = self.jobs.lock().unwrap();
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.status() {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::InProcess => counts.in_process += 1,
                JobStatus::Finished => counts.finished += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Drop terminal jobs whose completion is older than `max_age`.
    /// Returns the number of evicted jobs.
    pub fn evict_done_jobs(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero());
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| {
            let snapshot = job.snapshot();
            match (snapshot.status.is_terminal(), snapshot.finished_at) {
                (true, Some(finished_at)) => finished_at > cutoff,
                _ => true,
            }
        });
        before - jobs.len()
    }
}
