//! EthML Core
//!
//! Core types and abstractions for the EthML dispatch and settlement system.
//!
//! This crate contains:
//! - Domain types: tasks, jobs, workers, assignments, settlement records
//! - DTOs: worker channel messages and intake API payloads
//! - Error taxonomy shared by the dispatcher and worker agents

pub mod domain;
pub mod dto;
pub mod error;
