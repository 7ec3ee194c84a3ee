//! Ambient concerns shared across mysql-sidecar

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracing_middleware;

pub use config::Config;
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use metrics::{ProbeOutcome, METRICS};
