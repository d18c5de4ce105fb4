//! Queue consumer
//!
//! Blocks on the build queue and runs each dequeued deployment to
//! completion before taking the next one.

use std::sync::Arc;
use std::time::Duration;

use tarmac_storage::BuildQueue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::service::BuildPipeline;

/// Single-job-at-a-time queue consumer
pub struct QueueConsumer {
    queue: Arc<dyn BuildQueue>,
    pipeline: Arc<BuildPipeline>,
    retry_interval: Duration,
    shutdown: CancellationToken,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn BuildQueue>,
        pipeline: Arc<BuildPipeline>,
        retry_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            pipeline,
            retry_interval,
            shutdown,
        }
    }

    /// Consumes the queue until the shutdown token is cancelled
    ///
    /// Returns the number of deployments processed. A build in progress is
    /// allowed to finish; cancellation is observed between jobs and while
    /// waiting on the queue.
    pub async fn run(&self) -> usize {
        info!("Waiting for deployments");

        let mut processed = 0;

        loop {
            let popped = tokio::select! {
                () = self.shutdown.cancelled() => break,
                popped = self.queue.pop() => popped,
            };

            match popped {
                Ok(id) => {
                    info!(id = %id, "Dequeued deployment");
                    // Failures are logged and recorded by the pipeline.
                    if self.pipeline.run(&id).await.is_err() {
                        debug!(id = %id, "Deployment failed");
                    }
                    processed += 1;
                }
                Err(e) => {
                    error!("Failed to pop from build queue: {:#}", e);
                    tokio::select! {
                        () = self.shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.retry_interval) => {}
                    }
                }
            }
        }

        info!(processed, "Queue consumer stopped");
        processed
    }
}
