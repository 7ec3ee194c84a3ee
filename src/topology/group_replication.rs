//! Group replication: membership is the oracle

use crate::common::{Error, Result, ResultExt};
use crate::topology::{
    BootstrapContext, ClusterType, JoinProcedure, JoinRequest, ProbeContext, TopologyStrategy,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct GroupReplicationStrategy {
    procedure: Arc<dyn JoinProcedure>,
}

impl GroupReplicationStrategy {
    pub fn new(procedure: Arc<dyn JoinProcedure>) -> Self {
        Self { procedure }
    }
}

#[async_trait]
impl TopologyStrategy for GroupReplicationStrategy {
    fn cluster_type(&self) -> ClusterType {
        ClusterType::GroupReplication
    }

    async fn bootstrap(&self, ctx: &BootstrapContext<'_>) -> Result<()> {
        let fqdn = ctx
            .identity
            .pod_fqdn(ctx.service_name)
            .await
            .context("get pod hostname")?;
        let request = JoinRequest {
            cluster_type: self.cluster_type(),
            fqdn: Some(fqdn),
        };
        self.procedure
            .run(&request)
            .await
            .context("bootstrap group replication")
    }

    async fn check_readiness(&self, ctx: &mut ProbeContext<'_>) -> Result<()> {
        let fqdn = ctx
            .identity
            .pod_fqdn(ctx.service_name)
            .await
            .context("get pod hostname")?;

        let state = ctx
            .conn
            .member_state(&fqdn)
            .await
            .context("get member state")?;

        if !state.is_ready() {
            return Err(Error::State(format!("Member state: {}", state)));
        }
        Ok(())
    }

    /// A responsive member outside the primary partition is isolated in a
    /// minority and must not be trusted.
    async fn check_liveness(&self, ctx: &mut ProbeContext<'_>) -> Result<()> {
        let in_partition = ctx
            .conn
            .in_primary_partition()
            .await
            .context("check if member in primary partition")?;

        tracing::info!(in_primary_partition = in_partition, "group replication liveness");

        if !in_partition {
            return Err(Error::State("possible split brain!".into()));
        }
        Ok(())
    }
}
