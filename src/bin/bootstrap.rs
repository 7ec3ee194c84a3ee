use anyhow::Result;
use clap::Parser;
use mysql_sidecar::bootstrap::{idle, Bootstrapper};
use mysql_sidecar::common::{logging, Config};
use mysql_sidecar::identity::KubernetesIdentity;
use mysql_sidecar::Dispatcher;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mysql-bootstrap")]
#[command(about = "Join or initialize the replicated cluster once, then exit or idle")]
struct Args {
    /// Park after bootstrap instead of exiting (sidecar deployments)
    #[arg(long)]
    idle: bool,

    /// Grace window before dispatch, in seconds (overrides config)
    #[arg(long)]
    settle_secs: Option<u64>,

    /// Append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(secs) = args.settle_secs {
        config.bootstrap_settle_secs = secs;
    }
    if args.log_file.is_some() {
        config.log_file = args.log_file.clone();
    }

    logging::init(&config.log_level, config.log_file.as_deref())?;

    tracing::info!("Starting bootstrap");
    tracing::info!(
        "Cluster type: {}",
        config.cluster_type.as_deref().unwrap_or("<unset>")
    );
    tracing::info!("Data directory: {}", config.data_dir.display());

    let dispatcher = Dispatcher::from_config(&config)?;
    let identity = Arc::new(KubernetesIdentity::from_config(&config));
    let bootstrapper = Bootstrapper::new(&config, dispatcher, identity);

    let outcome = bootstrapper.run().await?;
    tracing::info!(?outcome, "bootstrap finished");

    if args.idle {
        idle().await;
    }

    Ok(())
}
