//! Service facade: job submission, status lookup, worker lifecycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::job::{Job, JobCounts, JobHandle, JobList};
use crate::queue::JobQueue;
use crate::source::Driver;
use crate::worker::Worker;

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub queue_length: usize,
    pub workers: usize,
    pub jobs: JobCounts,
}

/// The running synchronization service: queue, job collection, worker
/// pool and the background eviction of finished jobs.
pub struct SyncService {
    config: Arc<Config>,
    jobs: Arc<JobList>,
    queue: Arc<JobQueue>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    evictor: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    /// Start workers and the eviction task.
    pub fn start(config: Arc<Config>, driver: Arc<dyn Driver>) -> Arc<Self> {
        let queue = Arc::new(JobQueue::new(config.queue_capacity));
        let jobs = Arc::new(JobList::new());

        let workers = (0..config.workers)
            .map(|i| {
                let worker = Worker::new(config.clone(), driver.clone(), queue.clone());
                tracing::debug!("starting worker {i}");
                tokio::spawn(worker.run())
            })
            .collect();

        let evictor = {
            let jobs = jobs.clone();
            let max_age = config.max_age_done_jobs();
            tokio::spawn(async move {
                let period = max_age.min(Duration::from_secs(60)).max(Duration::from_secs(1));
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    let evicted = jobs.evict_done_jobs(max_age);
                    if evicted > 0 {
                        tracing::debug!("evicted {evicted} finished jobs");
                    }
                }
            })
        };

        Arc::new(Self {
            config,
            jobs,
            queue,
            workers: Mutex::new(workers),
            evictor: Mutex::new(Some(evictor)),
        })
    }

    /// Allocate a job for a configured layer and enqueue it.
    pub fn submit(&self, layer_name: &str, filter: Option<String>) -> Result<Job> {
        if self.config.layer(layer_name).is_none() {
            return Err(Error::UnknownLayer(layer_name.to_string()));
        }
        let job = JobHandle::new(Job::new(layer_name, filter));
        self.jobs.insert(job.clone());
        if let Err(e) = self.queue.push(job.clone()) {
            // never leave an unqueueable job addressable
            job.fail(e.to_string());
            return Err(e);
        }
        Ok(job.snapshot())
    }

    /// Look up a job by id for status polling.
    pub fn lookup(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|job| job.snapshot())
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            queue_length: self.queue.len(),
            workers: self.config.workers,
            jobs: self.jobs.counts(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down, waiting for workers to drain the queue");
        self.queue.close();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("worker task did not shut down cleanly: {e}");
            }
        }
        if let Some(evictor) = self.evictor.lock().unwrap().take() {
            evictor.abort();
        }
    }
}
