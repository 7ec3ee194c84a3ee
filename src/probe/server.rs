//! Combined probe server

use crate::bootstrap::Bootstrapper;
use crate::common::{Config, Error, Result};
use crate::db::MySqlConnector;
use crate::health::HealthEvaluator;
use crate::identity::{KubernetesIdentity, PodIdentity};
use crate::probe::http::{create_router, ProbeState};
use crate::topology::Dispatcher;
use std::future::IntoFuture;
use std::sync::Arc;

pub struct ProbeServer {
    config: Config,
}

impl ProbeServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting probe server");
        tracing::info!("  HTTP: {}", self.config.bind_addr);
        tracing::info!(
            "  Cluster type: {}",
            self.config.cluster_type.as_deref().unwrap_or("<unset>")
        );
        tracing::info!("  Data dir: {}", self.config.data_dir.display());
        tracing::info!("  Bootstrap on start: {}", self.config.bootstrap_on_start);

        let dispatcher = Dispatcher::from_config(&self.config)?;
        let identity: Arc<dyn PodIdentity> =
            Arc::new(KubernetesIdentity::from_config(&self.config));

        let evaluator = Arc::new(HealthEvaluator::new(
            &self.config,
            dispatcher.clone(),
            Arc::new(MySqlConnector::new()),
            identity.clone(),
        ));

        // Bootstrap gets its own task so a probe request timing out cannot
        // cancel it halfway.
        let (bootstrap_rx, bootstrap_task) = if self.config.bootstrap_on_start {
            let bootstrapper = Arc::new(Bootstrapper::new(&self.config, dispatcher, identity));
            let rx = bootstrapper.subscribe();
            let task = tokio::spawn(async move { bootstrapper.run().await });
            (Some(rx), Some(task))
        } else {
            (None, None)
        };

        let router = create_router(ProbeState {
            evaluator,
            bootstrap: bootstrap_rx,
            cluster_type: self.config.cluster_type.clone(),
        });

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();
        tokio::pin!(server);

        tracing::info!("✓ Probe server ready");

        if let Some(task) = bootstrap_task {
            tokio::select! {
                res = &mut server => {
                    return res.map_err(Error::from);
                }
                res = task => {
                    match res {
                        Ok(Ok(outcome)) => {
                            tracing::info!(?outcome, "bootstrap finished");
                        }
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "bootstrap failed, exiting for restart");
                            return Err(e);
                        }
                        Err(e) => {
                            return Err(Error::Internal(format!("bootstrap task: {}", e)));
                        }
                    }
                }
            }
        }

        server.await?;
        tracing::info!("Probe server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
