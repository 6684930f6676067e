//! Worker service orchestration
//!
//! Owns the task queue and a small pool of worker tasks. On startup the
//! recovery sweep runs once before any worker picks up a task, so calls
//! stranded by a previous crash are back in the queue first.

use crate::error::{WorkerError, WorkerResult};
use crate::processor::CallProcessor;
use crate::queue::TaskQueue;
use crate::store::CallStore;
use crate::sweeper;
use echolens_core::Call;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Poll interval for idle workers
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Call processing service
pub struct WorkerService {
    store: Arc<dyn CallStore>,
    processor: Arc<CallProcessor>,
    queue: Arc<TaskQueue>,
    worker_count: usize,
}

impl std::fmt::Debug for WorkerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerService")
            .field("worker_count", &self.worker_count)
            .field("queue", &self.queue.stats())
            .finish_non_exhaustive()
    }
}

impl WorkerService {
    /// Create a service
    pub fn new(
        store: Arc<dyn CallStore>,
        processor: Arc<CallProcessor>,
        queue: Arc<TaskQueue>,
        worker_count: usize,
    ) -> Self {
        Self {
            store,
            processor,
            queue,
            worker_count: worker_count.max(1),
        }
    }

    /// Register a new call and queue it for processing
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be persisted or enqueued.
    pub async fn submit_call(&self, audio_key: &str) -> WorkerResult<Uuid> {
        let call = Call::new(audio_key);
        let id = self.store.insert_call(&call).await?;
        self.queue.enqueue(id).await?;
        info!(call_id = %id, audio_key, "Call submitted");
        Ok(id)
    }

    /// Run until the shutdown channel closes
    ///
    /// Restores queue state, runs the recovery sweep, then serves tasks with
    /// the worker pool. On shutdown, workers finish their current task, and
    /// remaining pending tasks are saved for the next start.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker task panics or final persistence fails.
    pub async fn run(&self, shutdown: async_channel::Receiver<()>) -> WorkerResult<()> {
        if let Err(e) = self.queue.load_from_persistence().await {
            warn!(error = %e, "Could not restore queue state, starting empty");
        }

        let report = sweeper::recover(&self.store, &self.queue).await;
        info!(
            enqueued = report.enqueued,
            "Worker service ready, starting {} workers",
            self.worker_count
        );

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let processor = Arc::clone(&self.processor);
            let queue = Arc::clone(&self.queue);
            let shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, &processor, &queue, &shutdown).await;
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| WorkerError::pool(format!("Worker task panicked: {e}")))?;
        }

        self.queue.save_to_persistence().await?;
        info!("Worker service stopped");
        Ok(())
    }
}

/// One worker's consume loop
///
/// The attempt outcome is already persisted on the call itself by the
/// processor, so the task is acknowledged either way; a failed call waits
/// for the next sweep or an operator, not an automatic retry.
async fn worker_loop(
    worker_id: usize,
    processor: &CallProcessor,
    queue: &TaskQueue,
    shutdown: &async_channel::Receiver<()>,
) {
    info!(worker_id, "Worker started");

    loop {
        if let Some(task) = queue.dequeue() {
            if let Err(e) = processor.process(task.call_id).await {
                warn!(worker_id, call_id = %task.call_id, error = %e, "Task failed");
            }
            if let Err(e) = queue.acknowledge(task.call_id).await {
                error!(worker_id, call_id = %task.call_id, error = %e, "Acknowledgment failed");
            }
            continue;
        }

        if shutdown.is_closed() {
            break;
        }
        tokio::select! {
            _ = shutdown.recv() => break,
            () = tokio::time::sleep(IDLE_POLL) => {}
        }
    }

    info!(worker_id, "Worker stopped");
}
