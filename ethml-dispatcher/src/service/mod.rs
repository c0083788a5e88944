//! Service Module
//!
//! Business logic layer for the dispatcher.
//! The registry, queue, assignment table and settlement submitter are the
//! building blocks; the dispatcher ties them together; the task service
//! backs the intake endpoints.

pub mod assignment;
pub mod dispatcher;
pub mod queue;
pub mod registry;
pub mod settlement;
pub mod task;

// Re-export for convenience
pub use dispatcher::{DispatchSettings, Dispatcher, JobDisposition, select_worker};
pub use settlement::RetryPolicy;
pub use task as task_service;
