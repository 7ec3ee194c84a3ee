//! Database collaborator
//!
//! The evaluator only sees the [`Connector`] / [`MemberConnection`] pair.
//! Every probe opens its own connection and closes it before returning;
//! nothing is pooled.

pub mod mysql;

use crate::common::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use mysql::MySqlConnector;

/// Group replication member state as reported by the member itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberState {
    Online,
    Recovering,
    Offline,
    Unreachable,
    Error,
    Unknown,
}

impl MemberState {
    /// Only an online member may receive traffic.
    pub fn is_ready(&self) -> bool {
        matches!(self, MemberState::Online)
    }
}

impl FromStr for MemberState {
    type Err = std::convert::Infallible;

    /// Parses `performance_schema` spellings; anything else is `Unknown`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => MemberState::Online,
            "RECOVERING" => MemberState::Recovering,
            "OFFLINE" => MemberState::Offline,
            "UNREACHABLE" => MemberState::Unreachable,
            "ERROR" => MemberState::Error,
            _ => MemberState::Unknown,
        })
    }
}

impl std::fmt::Display for MemberState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberState::Online => write!(f, "Online"),
            MemberState::Recovering => write!(f, "Recovering"),
            MemberState::Offline => write!(f, "Offline"),
            MemberState::Unreachable => write!(f, "Unreachable"),
            MemberState::Error => write!(f, "Error"),
            MemberState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Async topology signals, queried independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplicationStatus {
    pub is_read_only: bool,
    /// Replication channel active
    pub is_replica: bool,
}

impl ReplicationStatus {
    /// A replica that accepts writes will have them overwritten by the stream.
    pub fn check(&self) -> Result<()> {
        if self.is_replica && !self.is_read_only {
            return Err(Error::State("replica is not read only".into()));
        }
        Ok(())
    }
}

/// Where and as whom to connect.
#[derive(Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens a fresh connection per call.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn MemberConnection>>;
}

/// One live connection to the local member. Cancellation happens by
/// dropping the in-flight future.
#[async_trait]
pub trait MemberConnection: Send {
    async fn is_read_only(&mut self) -> Result<bool>;

    async fn is_replica(&mut self) -> Result<bool>;

    async fn member_state(&mut self, fqdn: &str) -> Result<MemberState>;

    async fn in_primary_partition(&mut self) -> Result<bool>;

    /// Cheapest possible round trip.
    async fn dumb_query(&mut self) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_state_parse() {
        assert_eq!("ONLINE".parse::<MemberState>().unwrap(), MemberState::Online);
        assert_eq!(
            "recovering".parse::<MemberState>().unwrap(),
            MemberState::Recovering
        );
        assert_eq!("".parse::<MemberState>().unwrap(), MemberState::Unknown);
        assert_eq!("JOINING".parse::<MemberState>().unwrap(), MemberState::Unknown);
    }

    #[test]
    fn test_only_online_is_ready() {
        let all = [
            MemberState::Online,
            MemberState::Recovering,
            MemberState::Offline,
            MemberState::Unreachable,
            MemberState::Error,
            MemberState::Unknown,
        ];
        let ready: Vec<_> = all.iter().filter(|s| s.is_ready()).collect();
        assert_eq!(ready, vec![&MemberState::Online]);
    }

    #[test]
    fn test_replication_status_truth_table() {
        let cases = [
            (false, false, true),
            (true, false, true),
            (true, true, true),
            (false, true, false),
        ];
        for (is_read_only, is_replica, passes) in cases {
            let status = ReplicationStatus {
                is_read_only,
                is_replica,
            };
            assert_eq!(status.check().is_ok(), passes, "{:?}", status);
        }
    }

    #[test]
    fn test_endpoint_debug_redacts_password() {
        let endpoint = Endpoint {
            host: "10.0.0.1".into(),
            port: 33062,
            user: "monitor".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", endpoint).contains("hunter2"));
    }
}
