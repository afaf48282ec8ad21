//! Pull workers.
//!
//! A worker owns one database connection and processes one job at a
//! time. The loop runs until the queue is closed and drained.

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::error::Error;
use crate::job::JobStatus;
use crate::pull;
use crate::queue::JobQueue;
use crate::source::Driver;

pub struct Worker {
    config: Arc<Config>,
    driver: Arc<dyn Driver>,
    queue: Arc<JobQueue>,
    database: Database,
}

impl Worker {
    pub fn new(config: Arc<Config>, driver: Arc<dyn Driver>, queue: Arc<JobQueue>) -> Self {
        let database = Database::new(config.db.connection.clone());
        Self {
            config,
            driver,
            queue,
            database,
        }
    }

    /// Consume the queue until it is closed and drained.
    pub async fn run(mut self) {
        while let Some(job) = self.queue.pop().await {
            tracing::debug!("got job {} from the queue", job.id());
            job.set_status(JobStatus::InProcess);

            // Block until a database connection is available. A job
            // that is already running when the connection drops fails
            // inside pull instead and reconnects here on the next pop.
            let mut attempts = 0u32;
            while !self.database.reconnect().await {
                if attempts == 0 {
                    job.set_message("waiting to acquire a database connection");
                }
                attempts += 1;
                tokio::time::sleep(self.config.db_reconnect_wait()).await;
            }
            job.set_message("");

            let layer_name = job.layer();
            let Some(layer) = self.config.layer(&layer_name) else {
                let error = Error::UnknownLayer(layer_name);
                tracing::error!("{error}");
                job.fail(error.to_string());
                continue;
            };

            let filter = job.filter();
            match pull::pull(
                &mut self.database,
                self.driver.as_ref(),
                layer,
                &job.id(),
                filter.as_deref(),
            )
            .await
            {
                Ok(stats) => job.finish(stats),
                Err(error) => {
                    tracing::error!("job {} failed: {error}", job.id());
                    job.fail(error.to_string());
                }
            }
        }
        tracing::debug!("queue closed, worker exiting");
    }
}
