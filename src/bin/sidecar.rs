//! Probe server binary

use clap::{Parser, Subcommand};
use mysql_sidecar::common::{logging, Config};
use mysql_sidecar::probe::restart::restart_container;
use mysql_sidecar::ProbeServer;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mysql-sidecar")]
#[command(about = "Bootstrap and health probes for a replicated MySQL pod")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve startup/readiness/liveness/replication probes over HTTP
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Do not run bootstrap inside this process
        #[arg(long)]
        no_bootstrap: bool,

        /// Append logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Terminate a process so the container gets restarted
    RestartContainer {
        /// Target PID, usually the container's main process
        #[arg(long, default_value = "1")]
        pid: i32,

        /// Why, for the log
        #[arg(long)]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve {
            bind,
            no_bootstrap,
            log_file,
        } => {
            // CLI has priority over file and environment
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if no_bootstrap {
                config.bootstrap_on_start = false;
            }
            if log_file.is_some() {
                config.log_file = log_file;
            }
            logging::init(&config.log_level, config.log_file.as_deref())?;

            ProbeServer::new(config).serve().await?;
        }

        Commands::RestartContainer { pid, reason } => {
            logging::init(&config.log_level, config.log_file.as_deref())?;
            restart_container(pid, &reason)?;
        }
    }

    Ok(())
}
