//! Credential store backed by the mounted users secret

use crate::common::{Result, ResultExt};
use std::path::PathBuf;

/// One file per user under the mount path, holding the password.
#[derive(Debug, Clone)]
pub struct SecretStore {
    mount_path: PathBuf,
}

impl SecretStore {
    pub fn new(mount_path: impl Into<PathBuf>) -> Self {
        Self {
            mount_path: mount_path.into(),
        }
    }

    /// Read the password for `username`, whitespace trimmed.
    pub async fn get_secret(&self, username: &str) -> Result<String> {
        let path = self.mount_path.join(username);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .context(format!("read {}", path.display()))?;
        Ok(raw.trim().to_string())
    }
}
