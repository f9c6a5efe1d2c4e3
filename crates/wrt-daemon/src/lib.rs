//! wrt-daemon library target.
//!
//! Orchestrator, job definitions, wiring from config, and the status
//! router. The binary `main.rs` depends on this library target; tests drive
//! the same pieces in-process.

pub mod api_types;
pub mod jobs;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod wiring;
