//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used between EthML components: the worker
//! channel protocol (dispatcher <-> agent) and the intake API payloads
//! (client <-> dispatcher).

pub mod channel;
pub mod health;
pub mod task;
pub mod worker;
