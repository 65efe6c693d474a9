//! Queueing-network simulation engine.
//!
//! Services are bounded queues drained by worker pools and linked through a shared
//! routing table. A seeded load generator feeds clients to a paced dispatch pool,
//! every hop is a non-blocking hand-off, and a full or unknown next hop drops the
//! client. Per-node and per-dispatch-worker counters are merged into a
//! [`SimulationReport`] once all traffic has drained.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod inflight;
pub mod loader;
pub mod pacing;
pub mod report;
pub mod service;
pub mod simulation;
pub mod stats;

pub use client::*;
pub use config::*;
pub use dispatch::*;
pub use inflight::*;
pub use loader::*;
pub use pacing::*;
pub use report::*;
pub use service::*;
pub use simulation::*;
pub use stats::*;
