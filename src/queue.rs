//! Bounded FIFO job queue with a one-shot close signal.
//!
//! One write end (the submitter), many readers (the workers). `pop`
//! blocks until a job arrives or the queue is closed; closing releases
//! every current and future popper with `None`.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::job::JobHandle;

#[derive(Debug)]
struct QueueState {
    jobs: VecDeque<JobHandle>,
    closed: bool,
}

#[derive(Debug)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    notify: Notify,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Enqueue a job. Fails when the queue is closed or full.
    pub fn push(&self, job: JobHandle) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(Error::QueueClosed);
            }
            if state.jobs.len() >= self.capacity {
                return Err(Error::QueueFull);
            }
            state.jobs.push_back(job);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Dequeue the oldest job, waiting as long as necessary. `None`
    /// means the queue is closed and drained: the caller should exit.
    pub async fn pop(&self) -> Option<JobHandle> {
        loop {
            // Register interest before checking state so a push between
            // the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(job) = state.jobs.pop_front() {
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Close the queue. Idempotent; queued jobs are still handed out,
    /// then every popper is released.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}
