//! Error types for the worker service

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur in the task queue and worker pool
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Queue is at capacity
    #[error("Task queue is full (max: {max_size})")]
    QueueFull {
        /// Maximum queue size
        max_size: usize,
    },

    /// Call already has a queued or in-flight task
    #[error("Call {call_id} is already queued")]
    DuplicateTask {
        /// Call with the existing task
        call_id: Uuid,
    },

    /// Queue bookkeeping error
    #[error("Queue error: {message}")]
    Queue {
        /// Error message
        message: String,
    },

    /// Worker pool error
    #[error("Worker pool error: {message}")]
    Pool {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the processing pipeline
    #[error(transparent)]
    Core(#[from] echolens_core::Error),
}

impl WorkerError {
    /// Create a queue error
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    /// Create a worker pool error
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }
}
