//! Recovery marker gate
//!
//! Three presence-only flag files live in the data directory:
//! - `full-cluster-crash`: the whole cluster went down, wait for an operator
//! - `sleep-forever`: an operator parked this instance for inspection
//! - `startup_bootstrap.lock`: bootstrap finished for this data directory
//!
//! Only the bootstrap lock is ever written here. The other two are created
//! and removed externally.

use crate::common::{Result, ResultExt};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

pub const FULL_CLUSTER_CRASH_FILE: &str = "full-cluster-crash";
pub const MANUAL_RECOVERY_FILE: &str = "sleep-forever";
pub const BOOTSTRAP_LOCK_FILE: &str = "startup_bootstrap.lock";

/// Result of consulting the terminal markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "marker")]
pub enum Gate {
    Clear,
    FullClusterCrash(PathBuf),
    ManualRecovery(PathBuf),
}

impl Gate {
    /// Terminal markers suppress every cluster action.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Gate::Clear)
    }

    pub fn marker(&self) -> Option<&Path> {
        match self {
            Gate::Clear => None,
            Gate::FullClusterCrash(path) | Gate::ManualRecovery(path) => Some(path),
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.marker() {
            Some(path) => write!(f, "{} exists", path.display()),
            None => write!(f, "clear"),
        }
    }
}

/// Filesystem view over the marker files of one data directory.
#[derive(Debug, Clone)]
pub struct MarkerGate {
    full_cluster_crash: PathBuf,
    manual_recovery: PathBuf,
    bootstrap_lock: PathBuf,
}

impl MarkerGate {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            full_cluster_crash: dir.join(FULL_CLUSTER_CRASH_FILE),
            manual_recovery: dir.join(MANUAL_RECOVERY_FILE),
            bootstrap_lock: dir.join(BOOTSTRAP_LOCK_FILE),
        }
    }

    /// Check the terminal markers. Full cluster crash takes precedence.
    pub fn check(&self) -> Gate {
        if marker_present(&self.full_cluster_crash) {
            return Gate::FullClusterCrash(self.full_cluster_crash.clone());
        }
        if marker_present(&self.manual_recovery) {
            return Gate::ManualRecovery(self.manual_recovery.clone());
        }
        Gate::Clear
    }

    pub fn bootstrap_lock_path(&self) -> &Path {
        &self.bootstrap_lock
    }

    pub fn bootstrap_lock_present(&self) -> bool {
        marker_present(&self.bootstrap_lock)
    }

    /// Create the bootstrap lock. A single create, no read-modify-write.
    pub async fn write_bootstrap_lock(&self) -> Result<()> {
        tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.bootstrap_lock)
            .await
            .context(format!("create {}", self.bootstrap_lock.display()))?;
        Ok(())
    }

    /// Remove the bootstrap lock if present.
    pub async fn clear_bootstrap_lock(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.bootstrap_lock).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(format!("remove {}", self.bootstrap_lock.display())),
        }
    }
}

/// Existence check that separates "absent" from "cannot tell".
pub fn file_exists(path: &Path) -> io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Stat failures other than NotFound count as absent but are logged loudly:
/// they point at the volume, not at cluster state.
fn marker_present(path: &Path) -> bool {
    match file_exists(path) {
        Ok(present) => present,
        Err(e) => {
            tracing::error!(
                marker = %path.display(),
                error = %e,
                "cannot stat marker file, treating it as absent"
            );
            false
        }
    }
}
