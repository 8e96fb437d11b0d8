//! Shift Assigner Library
//!
//! Fills the open seats of volunteer shifts from approved requests, pending
//! requests and declared availability, with a fairness-aware ranking and a
//! per-run audit trace. Exposes:
//! - the assignment engine and its pipeline stages
//! - the diesel storage layer and schema probe
//! - the thin HTTP adapter used by the `shift-assigner` binary

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod services;
