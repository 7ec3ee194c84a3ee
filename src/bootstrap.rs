//! Bootstrap orchestrator
//!
//! Runs once per process: gate on the recovery markers, settle, clear a
//! stale lock, dispatch the topology's join procedure, commit the lock.
//! There is no in-process retry. A failure is latched and the container is
//! expected to be restarted.

use crate::common::metrics::METRICS;
use crate::common::{Config, Error, Result, ResultExt};
use crate::identity::PodIdentity;
use crate::markers::{Gate, MarkerGate};
use crate::topology::{BootstrapContext, Dispatcher};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Sleep interval while parked after bootstrap.
const IDLE_INTERVAL: Duration = Duration::from_secs(3600);

/// Externally visible progress, published on a watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum BootstrapStatus {
    Pending,
    Running,
    Completed,
    AlreadyBootstrapped,
    Skipped(Gate),
    Failed(String),
}

impl BootstrapStatus {
    /// Bootstrap has nothing left to do for this data directory.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            BootstrapStatus::Completed | BootstrapStatus::AlreadyBootstrapped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Completed,
    /// Lock written earlier by this process is still present
    AlreadyBootstrapped,
    /// Terminal marker present; no database contact, no lock written
    Skipped(Gate),
}

#[derive(Debug)]
enum Latch {
    Idle,
    Done,
    Failed(String),
}

pub struct Bootstrapper {
    cluster_type: Option<String>,
    service_name: String,
    settle: Duration,
    timeout: Duration,
    markers: MarkerGate,
    dispatcher: Dispatcher,
    identity: Arc<dyn PodIdentity>,
    latch: Mutex<Latch>,
    status: watch::Sender<BootstrapStatus>,
}

impl Bootstrapper {
    pub fn new(config: &Config, dispatcher: Dispatcher, identity: Arc<dyn PodIdentity>) -> Self {
        let (status, _) = watch::channel(BootstrapStatus::Pending);
        Self {
            cluster_type: config.cluster_type.clone(),
            service_name: config.service_name.clone(),
            settle: config.bootstrap_settle(),
            timeout: config.bootstrap_timeout(),
            markers: MarkerGate::new(&config.data_dir),
            dispatcher,
            identity,
            latch: Mutex::new(Latch::Idle),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BootstrapStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> BootstrapStatus {
        self.status.borrow().clone()
    }

    /// Run the state machine. Concurrent callers are serialized.
    pub async fn run(&self) -> Result<BootstrapOutcome> {
        let mut latch = self.latch.lock().await;

        let gate = self.markers.check();
        if gate.is_terminal() {
            tracing::warn!(gate = %gate, "recovery marker present, skipping bootstrap");
            self.publish(BootstrapStatus::Skipped(gate.clone()));
            METRICS.record_bootstrap("skipped");
            return Ok(BootstrapOutcome::Skipped(gate));
        }

        match &*latch {
            Latch::Failed(reason) => {
                return Err(Error::BootstrapFailed(format!(
                    "previous attempt failed: {}",
                    reason
                )));
            }
            Latch::Done if self.markers.bootstrap_lock_present() => {
                tracing::info!("bootstrap already completed in this process");
                self.publish(BootstrapStatus::AlreadyBootstrapped);
                METRICS.record_bootstrap("already_bootstrapped");
                return Ok(BootstrapOutcome::AlreadyBootstrapped);
            }
            Latch::Done => {
                tracing::info!(
                    lock = %self.markers.bootstrap_lock_path().display(),
                    "bootstrap lock removed, bootstrapping again"
                );
            }
            Latch::Idle => {}
        }

        self.publish(BootstrapStatus::Running);
        match self.bootstrap().await {
            Ok(()) => {
                *latch = Latch::Done;
                self.publish(BootstrapStatus::Completed);
                METRICS.record_bootstrap("completed");
                Ok(BootstrapOutcome::Completed)
            }
            Err(e) => {
                tracing::error!(kind = %e.kind(), error = %e, "bootstrap failed");
                *latch = Latch::Failed(e.to_string());
                self.publish(BootstrapStatus::Failed(e.to_string()));
                METRICS.record_bootstrap("failed");
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> Result<()> {
        let strategy = self.dispatcher.resolve(self.cluster_type.as_deref())?;
        tracing::info!(cluster_type = %strategy.cluster_type(), "starting bootstrap");

        if !self.settle.is_zero() {
            tracing::info!(
                settle_secs = self.settle.as_secs(),
                "waiting for mysqld and peer discovery"
            );
            tokio::time::sleep(self.settle).await;
        }

        self.markers
            .clear_bootstrap_lock()
            .await
            .context("clear stale bootstrap lock")?;

        let ctx = BootstrapContext {
            identity: self.identity.as_ref(),
            service_name: &self.service_name,
        };
        tokio::time::timeout(self.timeout, strategy.bootstrap(&ctx))
            .await
            .map_err(|_| {
                Error::Timeout(format!("bootstrap exceeded {:?}", self.timeout))
            })??;

        self.markers
            .write_bootstrap_lock()
            .await
            .context("write bootstrap lock")?;
        tracing::info!(
            lock = %self.markers.bootstrap_lock_path().display(),
            "bootstrap complete"
        );
        Ok(())
    }

    fn publish(&self, status: BootstrapStatus) {
        self.status.send_replace(status);
    }
}

/// Park forever so a sidecar container is not seen as exited.
pub async fn idle() {
    tracing::info!("bootstrap finished, idling");
    loop {
        tokio::time::sleep(IDLE_INTERVAL).await;
    }
}
