//! Service layer
//!
//! Services contain the business logic of the worker: running predictions,
//! tracking active jobs, and sampling host load for heartbeats.
//!
//! All services are trait-based to enable testing and dependency injection.

mod execution;
mod predictor;
mod status;

// Re-export traits
pub use execution::ExecutionService;
pub use predictor::Predictor;
pub use status::StatusProbe;

// Re-export implementations
pub use execution::StandardExecutionService;
pub use predictor::ProcessPredictor;
pub use status::SystemStatusProbe;
