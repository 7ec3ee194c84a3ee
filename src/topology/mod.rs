//! Topology dispatch
//!
//! Each supported cluster topology is a [`TopologyStrategy`]. The
//! bootstrap orchestrator and the health evaluator only talk to the trait;
//! a new topology is a new strategy registered with the [`Dispatcher`].

pub mod async_replication;
pub mod group_replication;
pub mod procedure;

use crate::common::{Config, Error, Result};
use crate::db::MemberConnection;
use crate::identity::PodIdentity;
use crate::markers::MarkerGate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

pub use async_replication::AsyncReplicationStrategy;
pub use group_replication::GroupReplicationStrategy;
pub use procedure::{CommandProcedure, JoinProcedure, JoinRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterType {
    #[serde(rename = "group-replication")]
    GroupReplication,
    #[serde(rename = "async")]
    AsyncReplication,
}

impl ClusterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::GroupReplication => "group-replication",
            ClusterType::AsyncReplication => "async",
        }
    }
}

impl FromStr for ClusterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "group-replication" => Ok(ClusterType::GroupReplication),
            "async" => Ok(ClusterType::AsyncReplication),
            other => Err(Error::InvalidConfig(format!(
                "invalid CLUSTER_TYPE: {:?}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ClusterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a strategy needs while bootstrapping.
pub struct BootstrapContext<'a> {
    pub identity: &'a dyn PodIdentity,
    pub service_name: &'a str,
}

/// What a strategy needs while answering a probe.
pub struct ProbeContext<'a> {
    pub conn: &'a mut dyn MemberConnection,
    pub identity: &'a dyn PodIdentity,
    pub service_name: &'a str,
}

#[async_trait]
pub trait TopologyStrategy: Send + Sync {
    fn cluster_type(&self) -> ClusterType;

    /// Join or initialize the cluster. Idempotency at the protocol level is
    /// the procedure's job.
    async fn bootstrap(&self, ctx: &BootstrapContext<'_>) -> Result<()>;

    /// Local checks that must hold before a readiness query is worth a
    /// connection.
    fn readiness_precondition(&self, _markers: &MarkerGate) -> Result<()> {
        Ok(())
    }

    async fn check_readiness(&self, ctx: &mut ProbeContext<'_>) -> Result<()>;

    async fn check_liveness(&self, ctx: &mut ProbeContext<'_>) -> Result<()>;
}

/// Maps a cluster type to its strategy.
#[derive(Clone, Default)]
pub struct Dispatcher {
    strategies: HashMap<ClusterType, Arc<dyn TopologyStrategy>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, strategy: Arc<dyn TopologyStrategy>) -> Self {
        self.strategies.insert(strategy.cluster_type(), strategy);
        self
    }

    /// Both built-in topologies, joining through external commands.
    pub fn from_config(config: &Config) -> Result<Self> {
        let gr = CommandProcedure::parse(&config.group_replication_join_command)?;
        let async_join = CommandProcedure::parse(&config.async_join_command)?;
        Ok(Self::new()
            .register(Arc::new(GroupReplicationStrategy::new(Arc::new(gr))))
            .register(Arc::new(AsyncReplicationStrategy::new(Arc::new(
                async_join,
            )))))
    }

    /// Resolve the raw `CLUSTER_TYPE`. Missing, unknown, and unregistered
    /// types are configuration errors.
    pub fn resolve(&self, raw: Option<&str>) -> Result<Arc<dyn TopologyStrategy>> {
        let raw = raw.ok_or_else(|| {
            Error::InvalidConfig("missing CLUSTER_TYPE environment variable".into())
        })?;
        let cluster_type: ClusterType = raw.parse()?;
        self.strategies.get(&cluster_type).cloned().ok_or_else(|| {
            Error::InvalidConfig(format!("no strategy registered for {}", cluster_type))
        })
    }
}
