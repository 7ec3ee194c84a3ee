//! # mysql-sidecar
//!
//! Lifecycle controller that runs next to every MySQL pod of a replicated
//! cluster:
//! - decides once per pod start how the instance joins or initializes the
//!   cluster (bootstrap)
//! - answers readiness, liveness and replication probes for the
//!   orchestrator, including split-brain detection for group replication
//!
//! Both paths honor the recovery markers in the data directory and keep no
//! state beyond them.
//!
//! ## Architecture
//!
//! ```text
//!   orchestrator probes ──HTTP──▶ probe::http ──▶ health::HealthEvaluator
//!                                     │                   │
//!                                     │          topology::Dispatcher
//!                                     ▼           ┌───────┴────────┐
//!                         bootstrap::Bootstrapper  group-repl    async
//!                                     │              │             │
//!                                markers::MarkerGate      db::Connector (MySQL)
//! ```
//!
//! ## Usage
//!
//! ### Combined probe server (bootstrap on start)
//! ```bash
//! CLUSTER_TYPE=group-replication SERVICE_NAME=cluster1-mysql \
//!   mysql-sidecar serve --bind 0.0.0.0:8090
//! ```
//!
//! ### One-shot commands
//! ```bash
//! mysql-bootstrap --idle
//! mysql-healthcheck readiness
//! mysql-sidecar restart-container --pid 1 --reason "stuck in RECOVERING"
//! ```

pub mod bootstrap;
pub mod common;
pub mod credentials;
pub mod db;
pub mod health;
pub mod identity;
pub mod markers;
pub mod probe;
pub mod topology;

// Re-export commonly used types
pub use bootstrap::{BootstrapOutcome, BootstrapStatus, Bootstrapper};
pub use common::{Config, Error, Result};
pub use health::{HealthEvaluator, HealthVerdict, ProbeKind};
pub use markers::{Gate, MarkerGate};
pub use probe::ProbeServer;
pub use topology::{ClusterType, Dispatcher, TopologyStrategy};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
