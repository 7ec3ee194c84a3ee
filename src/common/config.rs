//! Configuration for mysql-sidecar
//!
//! Layered with the `config` crate: defaults, then an optional TOML file,
//! then `SIDECAR_*` environment variables, then the deployment contract
//! variables (`CLUSTER_TYPE`, `SERVICE_NAME`, `HOSTNAME`, `POD_IP`).

use crate::common::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "MYSQL_SIDECAR_CONFIG";

/// Prefix for tunable environment overrides, e.g. `SIDECAR_PROBE_TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "SIDECAR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Raw `CLUSTER_TYPE`; parsed at first use
    #[serde(default)]
    pub cluster_type: Option<String>,

    /// Headless service name used to build the pod FQDN
    #[serde(default)]
    pub service_name: String,

    /// MySQL data directory, home of the marker files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Mount path of the per-user credential files
    #[serde(default = "default_creds_mount_path")]
    pub creds_mount_path: PathBuf,

    /// User the probes connect as
    #[serde(default = "default_monitor_user")]
    pub monitor_user: String,

    /// MySQL admin port
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// Probe server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Grace window before dispatching the join procedure
    #[serde(default = "default_bootstrap_settle")]
    pub bootstrap_settle_secs: u64,

    #[serde(default = "default_bootstrap_timeout")]
    pub bootstrap_timeout_secs: u64,

    /// Run the bootstrap task inside `serve`
    #[serde(default = "default_true")]
    pub bootstrap_on_start: bool,

    #[serde(default = "default_gr_join_command")]
    pub group_replication_join_command: String,

    #[serde(default = "default_async_join_command")]
    pub async_join_command: String,

    #[serde(default = "default_namespace_file")]
    pub namespace_file: PathBuf,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub pod_ip: Option<String>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Append logs to this file in addition to stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/mysql")
}
fn default_creds_mount_path() -> PathBuf {
    PathBuf::from("/etc/mysql/mysql-users-secret")
}
fn default_monitor_user() -> String {
    "monitor".to_string()
}
fn default_admin_port() -> u16 {
    33062
}
fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8090))
}
fn default_probe_timeout() -> u64 {
    10
}
fn default_bootstrap_settle() -> u64 {
    20
}
fn default_bootstrap_timeout() -> u64 {
    1800
}
fn default_true() -> bool {
    true
}
fn default_gr_join_command() -> String {
    "/opt/percona/bootstrap-group-replication".to_string()
}
fn default_async_join_command() -> String {
    "/opt/percona/bootstrap-async".to_string()
}
fn default_namespace_file() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/namespace")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_type: None,
            service_name: String::new(),
            data_dir: default_data_dir(),
            creds_mount_path: default_creds_mount_path(),
            monitor_user: default_monitor_user(),
            admin_port: default_admin_port(),
            bind_addr: default_bind_addr(),
            probe_timeout_secs: default_probe_timeout(),
            bootstrap_settle_secs: default_bootstrap_settle(),
            bootstrap_timeout_secs: default_bootstrap_timeout(),
            bootstrap_on_start: true,
            group_replication_join_command: default_gr_join_command(),
            async_join_command: default_async_join_command(),
            namespace_file: default_namespace_file(),
            hostname: None,
            pod_ip: None,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load from the process environment and the optional config file.
    pub fn load() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let file = vars.get(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_from(file.as_deref(), &vars)
    }

    /// Load from an explicit file and variable set.
    pub fn load_from(file: Option<&Path>, vars: &HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let prefixed: config::Map<String, String> = vars
            .iter()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .source(Some(prefixed)),
        );

        for (key, var) in [
            ("cluster_type", "CLUSTER_TYPE"),
            ("service_name", "SERVICE_NAME"),
            ("hostname", "HOSTNAME"),
            ("pod_ip", "POD_IP"),
        ] {
            builder = builder.set_override_option(key, vars.get(var).cloned())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn bootstrap_settle(&self) -> Duration {
        Duration::from_secs(self.bootstrap_settle_secs)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }
}
