//! Async primary/replica replication
//!
//! There is no membership oracle here, so readiness leans on the bootstrap
//! lock and on cross-checking read-only against the replication channel.

use crate::common::{Error, Result, ResultExt};
use crate::db::ReplicationStatus;
use crate::markers::MarkerGate;
use crate::topology::{
    BootstrapContext, ClusterType, JoinProcedure, JoinRequest, ProbeContext, TopologyStrategy,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct AsyncReplicationStrategy {
    procedure: Arc<dyn JoinProcedure>,
}

impl AsyncReplicationStrategy {
    pub fn new(procedure: Arc<dyn JoinProcedure>) -> Self {
        Self { procedure }
    }
}

#[async_trait]
impl TopologyStrategy for AsyncReplicationStrategy {
    fn cluster_type(&self) -> ClusterType {
        ClusterType::AsyncReplication
    }

    async fn bootstrap(&self, ctx: &BootstrapContext<'_>) -> Result<()> {
        // The FQDN is informational for async joins.
        let fqdn = match ctx.identity.pod_fqdn(ctx.service_name).await {
            Ok(fqdn) => Some(fqdn),
            Err(e) => {
                tracing::warn!(error = %e, "pod FQDN unavailable for async bootstrap");
                None
            }
        };
        let request = JoinRequest {
            cluster_type: self.cluster_type(),
            fqdn,
        };
        self.procedure
            .run(&request)
            .await
            .context("bootstrap async replication")
    }

    fn readiness_precondition(&self, markers: &MarkerGate) -> Result<()> {
        if !markers.bootstrap_lock_present() {
            return Err(Error::State("bootstrap not complete".into()));
        }
        Ok(())
    }

    async fn check_readiness(&self, ctx: &mut ProbeContext<'_>) -> Result<()> {
        let is_read_only = ctx
            .conn
            .is_read_only()
            .await
            .context("check read only status")?;
        let is_replica = ctx
            .conn
            .is_replica()
            .await
            .context("check replica status")?;

        ReplicationStatus {
            is_read_only,
            is_replica,
        }
        .check()
    }

    /// Responsiveness only; replication health is readiness' business.
    async fn check_liveness(&self, ctx: &mut ProbeContext<'_>) -> Result<()> {
        ctx.conn.dumb_query().await.context("dumb query")
    }
}
