//! Probe surface consumed by the orchestrator
//!
//! - `http`: startup / readiness / liveness / replication routes
//! - `server`: combined server with the in-process bootstrap task
//! - `restart`: administrative container restart

pub mod http;
pub mod restart;
pub mod server;

pub use server::ProbeServer;
