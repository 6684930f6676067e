//! Call processing worker and recovery pipeline for `EchoLens`

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod error;
pub mod processor;
pub mod queue;
pub mod service;
pub mod store;
pub mod sweeper;

pub use error::{WorkerError, WorkerResult};
pub use processor::CallProcessor;
pub use queue::{QueuedTask, TaskQueue};
pub use service::WorkerService;
pub use store::{CallStore, MemoryCallStore, PgCallStore};
pub use sweeper::SweepReport;
