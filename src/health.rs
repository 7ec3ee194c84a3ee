//! Health evaluator
//!
//! Stateless per call: consult the markers, open a fresh connection as the
//! monitor user, run the probe's queries for the configured topology, close
//! the connection. Nothing is cached between probes.

use crate::common::metrics::{ProbeOutcome, METRICS};
use crate::common::{Config, Error, Result, ResultExt};
use crate::credentials::SecretStore;
use crate::db::{Connector, Endpoint, MemberConnection};
use crate::identity::PodIdentity;
use crate::markers::{Gate, MarkerGate};
use crate::topology::{Dispatcher, ProbeContext};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Readiness,
    Liveness,
    /// Topology independent: is the replication channel running
    Replication,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Readiness => "readiness",
            ProbeKind::Liveness => "liveness",
            ProbeKind::Replication => "replication",
        }
    }

    /// Capitalized name for response bodies.
    pub fn title(&self) -> &'static str {
        match self {
            ProbeKind::Readiness => "Readiness",
            ProbeKind::Liveness => "Liveness",
            ProbeKind::Replication => "Replication",
        }
    }
}

impl FromStr for ProbeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "readiness" => Ok(ProbeKind::Readiness),
            "liveness" => Ok(ProbeKind::Liveness),
            "replication" => Ok(ProbeKind::Replication),
            other => Err(Error::InvalidConfig(format!("unknown probe: {}", other))),
        }
    }
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    Pass,
    /// A terminal marker is present; the check was not run and the probe
    /// passes through so the platform leaves the pod alone.
    Skipped(Gate),
    Fail(String),
}

impl HealthVerdict {
    pub fn is_pass(&self) -> bool {
        !matches!(self, HealthVerdict::Fail(_))
    }
}

pub struct HealthEvaluator {
    cluster_type: Option<String>,
    service_name: String,
    monitor_user: String,
    admin_port: u16,
    timeout: Duration,
    markers: MarkerGate,
    secrets: SecretStore,
    dispatcher: Dispatcher,
    connector: Arc<dyn Connector>,
    identity: Arc<dyn PodIdentity>,
}

impl HealthEvaluator {
    pub fn new(
        config: &Config,
        dispatcher: Dispatcher,
        connector: Arc<dyn Connector>,
        identity: Arc<dyn PodIdentity>,
    ) -> Self {
        Self {
            cluster_type: config.cluster_type.clone(),
            service_name: config.service_name.clone(),
            monitor_user: config.monitor_user.clone(),
            admin_port: config.admin_port,
            timeout: config.probe_timeout(),
            markers: MarkerGate::new(&config.data_dir),
            secrets: SecretStore::new(&config.creds_mount_path),
            dispatcher,
            connector,
            identity,
        }
    }

    pub fn markers(&self) -> &MarkerGate {
        &self.markers
    }

    /// Run one probe under the probe deadline. Never panics or propagates:
    /// every failure becomes a `Fail` with the wrapped cause.
    pub async fn evaluate(&self, kind: ProbeKind) -> HealthVerdict {
        let start = Instant::now();

        let gate = self.markers.check();
        if gate.is_terminal() {
            tracing::info!(probe = %kind, gate = %gate, "skipping probe");
            METRICS.record_probe(kind.as_str(), ProbeOutcome::Skipped, start.elapsed());
            return HealthVerdict::Skipped(gate);
        }

        let (verdict, outcome) = match tokio::time::timeout(self.timeout, self.run(kind)).await {
            Ok(Ok(())) => (HealthVerdict::Pass, ProbeOutcome::Pass),
            Ok(Err(e)) => {
                if e.is_retryable() {
                    tracing::warn!(probe = %kind, kind = %e.kind(), error = %e, "probe failed");
                } else {
                    tracing::error!(probe = %kind, kind = %e.kind(), error = %e, "probe failed");
                }
                (HealthVerdict::Fail(e.to_string()), ProbeOutcome::Fail)
            }
            Err(_) => {
                let e = Error::Timeout(format!("{} probe exceeded {:?}", kind, self.timeout));
                tracing::warn!(probe = %kind, error = %e, "probe timed out");
                (HealthVerdict::Fail(e.to_string()), ProbeOutcome::Timeout)
            }
        };

        METRICS.record_probe(kind.as_str(), outcome, start.elapsed());
        verdict
    }

    async fn run(&self, kind: ProbeKind) -> Result<()> {
        if kind == ProbeKind::Replication {
            let mut conn = self.connect().await?;
            let result = check_replication(conn.as_mut()).await;
            self.release(conn).await;
            return result;
        }

        let strategy = self.dispatcher.resolve(self.cluster_type.as_deref())?;
        if kind == ProbeKind::Readiness {
            strategy.readiness_precondition(&self.markers)?;
        }

        let mut conn = self.connect().await?;
        let result = {
            let mut ctx = ProbeContext {
                conn: conn.as_mut(),
                identity: self.identity.as_ref(),
                service_name: &self.service_name,
            };
            match kind {
                ProbeKind::Readiness => strategy.check_readiness(&mut ctx).await,
                _ => strategy.check_liveness(&mut ctx).await,
            }
        };
        self.release(conn).await;
        result
    }

    async fn connect(&self) -> Result<Box<dyn MemberConnection>> {
        let host = self.identity.pod_address().await.context("get pod IP")?;
        let password = self
            .secrets
            .get_secret(&self.monitor_user)
            .await
            .context(format!("get {} password", self.monitor_user))?;

        let endpoint = Endpoint {
            host,
            port: self.admin_port,
            user: self.monitor_user.clone(),
            password,
        };
        self.connector
            .connect(&endpoint)
            .await
            .context("connect to db")
    }

    async fn release(&self, conn: Box<dyn MemberConnection>) {
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "closing probe connection");
        }
    }
}

async fn check_replication(conn: &mut dyn MemberConnection) -> Result<()> {
    let is_replica = conn.is_replica().await.context("check replica status")?;
    if !is_replica {
        return Err(Error::State("replication is not active".into()));
    }
    Ok(())
}
