//! External join/initialize procedures

use crate::common::{Error, Result, ResultExt};
use crate::topology::ClusterType;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub cluster_type: ClusterType,
    pub fqdn: Option<String>,
}

#[async_trait]
pub trait JoinProcedure: Send + Sync {
    async fn run(&self, request: &JoinRequest) -> Result<()>;
}

/// Runs an executable; exit status 0 means joined.
#[derive(Debug, Clone)]
pub struct CommandProcedure {
    program: String,
    args: Vec<String>,
}

impl CommandProcedure {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Whitespace separated argv.
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::InvalidConfig("empty join command".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl JoinProcedure for CommandProcedure {
    async fn run(&self, request: &JoinRequest) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("CLUSTER_TYPE", request.cluster_type.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(fqdn) = &request.fqdn {
            command.env("POD_FQDN", fqdn);
        }

        tracing::info!(program = %self.program, args = ?self.args, "running join procedure");
        let mut child = command
            .spawn()
            .context(format!("spawn {}", self.program))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, _, _) = tokio::join!(
            child.wait(),
            forward_lines(stdout, &self.program, "stdout"),
            forward_lines(stderr, &self.program, "stderr"),
        );
        let status = status.context(format!("wait for {}", self.program))?;

        if !status.success() {
            return Err(Error::BootstrapFailed(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

async fn forward_lines<R>(reader: Option<R>, program: &str, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else { return };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(program = %program, stream, "{}", line);
    }
}
