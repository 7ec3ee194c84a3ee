//! Container restart escape hatch
//!
//! Terminating the container's main process makes the orchestrator restart
//! the container. This is an operator action for stuck states and is never
//! taken by the bootstrap or health paths.

use crate::common::{Error, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Send SIGTERM to `pid`, logging who asked and why.
pub fn restart_container(pid: i32, reason: &str) -> Result<()> {
    if pid <= 0 {
        return Err(Error::InvalidConfig(format!("refusing to signal pid {}", pid)));
    }

    tracing::warn!(pid, reason, "forcing container restart");
    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|e| Error::Internal(format!("send SIGTERM to {}: {}", pid, e)))
}
