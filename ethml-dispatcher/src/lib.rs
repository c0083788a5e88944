//! EthML Dispatcher
//!
//! Accepts paid prediction tasks, fans each one out to exactly one connected
//! worker, and settles the winning result on the ledger.
//!
//! Layers:
//! - `api`: axum routes for task intake and the worker WebSocket channel
//! - `service`: registry, queue, assignment table, dispatcher, settlement
//! - `repository`: task and settlement persistence (Postgres or in-memory)
//! - `ledger`: the contract gateway client

pub mod api;
pub mod config;
pub mod db;
pub mod ledger;
pub mod repository;
pub mod service;
pub mod state;
