//! One-shot exec probe

use clap::Parser;
use mysql_sidecar::common::{logging, Config};
use mysql_sidecar::db::MySqlConnector;
use mysql_sidecar::identity::KubernetesIdentity;
use mysql_sidecar::{Dispatcher, HealthEvaluator, HealthVerdict, ProbeKind};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mysql-healthcheck")]
#[command(about = "Evaluate one probe and report it through the exit code")]
#[command(version)]
struct Cli {
    /// readiness, liveness or replication
    probe: ProbeKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load()?;
    logging::init(&config.log_level, config.log_file.as_deref())?;

    let dispatcher = Dispatcher::from_config(&config)?;
    let evaluator = HealthEvaluator::new(
        &config,
        dispatcher,
        Arc::new(MySqlConnector::new()),
        Arc::new(KubernetesIdentity::from_config(&config)),
    );

    match evaluator.evaluate(cli.probe).await {
        HealthVerdict::Pass => {
            tracing::info!("{} check passed", cli.probe.title());
            Ok(ExitCode::SUCCESS)
        }
        HealthVerdict::Skipped(gate) => {
            tracing::info!("{}, skipping {} check", gate, cli.probe);
            Ok(ExitCode::SUCCESS)
        }
        HealthVerdict::Fail(reason) => {
            tracing::error!("{} check failed: {}", cli.probe, reason);
            Ok(ExitCode::FAILURE)
        }
    }
}
