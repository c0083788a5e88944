//! Core domain types
//!
//! This module contains the domain structures shared across EthML services.
//! They are persisted by the dispatcher, exchanged with worker agents over the
//! channel, and returned to clients by the intake API.

pub mod assignment;
pub mod job;
pub mod settlement;
pub mod task;
pub mod worker;
