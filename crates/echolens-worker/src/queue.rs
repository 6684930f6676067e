//! Durable task queue for call processing
//!
//! FIFO queue of call ids with optional JSON persistence. Acknowledgment is
//! late: a dequeued task stays tracked as in-flight until the worker reports
//! the attempt finished, success or failure. Tasks lost in a crash are not
//! redelivered by the queue itself; reconciliation happens through the
//! recovery sweeper, which reads authoritative state from the call store.

use crate::error::{WorkerError, WorkerResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// A call waiting to be processed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuedTask {
    /// Call to process
    pub call_id: Uuid,

    /// When the task was enqueued
    pub queued_at: DateTime<Utc>,
}

/// Queue statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting to be picked up
    pub pending: usize,

    /// Tasks dequeued but not yet acknowledged
    pub in_flight: usize,

    /// Tasks acknowledged since startup
    pub acknowledged: u64,
}

/// Thread-safe call processing queue
#[derive(Debug)]
pub struct TaskQueue {
    /// Pending tasks in arrival order
    pending: RwLock<VecDeque<QueuedTask>>,

    /// Dequeued, unacknowledged tasks (call id -> task)
    in_flight: DashMap<Uuid, QueuedTask>,

    /// Maximum number of pending tasks
    max_size: usize,

    /// Optional file for queue persistence
    persistence_file: Option<PathBuf>,

    /// Tasks acknowledged since startup
    acknowledged: RwLock<u64>,
}

impl TaskQueue {
    /// Create a new queue
    #[must_use]
    pub fn new(max_size: usize, persistence_file: Option<PathBuf>) -> Self {
        Self {
            pending: RwLock::new(VecDeque::new()),
            in_flight: DashMap::new(),
            max_size,
            persistence_file,
            acknowledged: RwLock::new(0),
        }
    }

    /// Load pending tasks from the persistence file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load_from_persistence(&self) -> WorkerResult<()> {
        if let Some(ref persistence_file) = self.persistence_file
            && persistence_file.exists()
        {
            tracing::info!("Loading queue state from {}", persistence_file.display());

            let data = fs::read_to_string(persistence_file).await?;
            let saved: Vec<QueuedTask> = serde_json::from_str(&data)
                .map_err(|e| WorkerError::queue(format!("Failed to parse persistence file: {e}")))?;

            let count = saved.len();
            let mut pending = self.pending.write();
            for task in saved {
                if !pending.iter().any(|t| t.call_id == task.call_id) {
                    pending.push_back(task);
                }
            }
            drop(pending);

            tracing::info!("Loaded {count} tasks from persistence");
        }
        Ok(())
    }

    /// Save pending tasks to the persistence file
    ///
    /// Only pending tasks are written. In-flight tasks lost in a crash are
    /// recovered from call status by the sweeper, not from this file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save_to_persistence(&self) -> WorkerResult<()> {
        if let Some(ref persistence_file) = self.persistence_file {
            let tasks: Vec<QueuedTask> = self.pending.read().iter().cloned().collect();

            let data = serde_json::to_string_pretty(&tasks)
                .map_err(|e| WorkerError::queue(format!("Failed to serialize queue: {e}")))?;

            if let Some(parent) = persistence_file.parent() {
                fs::create_dir_all(parent).await?;
            }

            fs::write(persistence_file, data).await?;
            tracing::debug!("Saved queue state to {}", persistence_file.display());
        }
        Ok(())
    }

    /// Add a processing task for a call
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::QueueFull`] at capacity and
    /// [`WorkerError::DuplicateTask`] when the call already has a pending or
    /// in-flight task.
    pub async fn enqueue(&self, call_id: Uuid) -> WorkerResult<()> {
        {
            let mut pending = self.pending.write();

            if pending.len() >= self.max_size {
                return Err(WorkerError::QueueFull {
                    max_size: self.max_size,
                });
            }
            if pending.iter().any(|t| t.call_id == call_id) || self.in_flight.contains_key(&call_id)
            {
                return Err(WorkerError::DuplicateTask { call_id });
            }

            pending.push_back(QueuedTask {
                call_id,
                queued_at: Utc::now(),
            });
        }

        tracing::debug!(%call_id, "Enqueued call for processing");
        self.save_to_persistence().await?;

        Ok(())
    }

    /// Take the next task, marking it in-flight
    #[must_use]
    pub fn dequeue(&self) -> Option<QueuedTask> {
        let task = self.pending.write().pop_front()?;
        self.in_flight.insert(task.call_id, task.clone());
        tracing::debug!(call_id = %task.call_id, "Dequeued call for processing");
        Some(task)
    }

    /// Acknowledge a finished attempt, success or failure
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence file cannot be written.
    pub async fn acknowledge(&self, call_id: Uuid) -> WorkerResult<()> {
        if self.in_flight.remove(&call_id).is_some() {
            *self.acknowledged.write() += 1;
            tracing::debug!(%call_id, "Acknowledged task");
        }
        self.save_to_persistence().await
    }

    /// Number of pending tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    /// Whether nothing is pending or in flight
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.read().is_empty() && self.in_flight.is_empty()
    }

    /// Snapshot of queue counters
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending.read().len(),
            in_flight: self.in_flight.len(),
            acknowledged: *self.acknowledged.read(),
        }
    }
}
