//! `mysql_async` implementation of the database collaborator

use crate::common::{Error, Result, ResultExt};
use crate::db::{Connector, Endpoint, MemberConnection, MemberState};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder};

const READ_ONLY_QUERY: &str = "SELECT @@read_only";

// Default channel only; both the receiver and the applier must be running.
const REPLICATION_STATUS_QUERY: &str = "\
SELECT connection_status.SERVICE_STATE, applier_status.SERVICE_STATE \
FROM performance_schema.replication_connection_status connection_status \
JOIN performance_schema.replication_applier_status applier_status \
  ON connection_status.CHANNEL_NAME = applier_status.CHANNEL_NAME \
WHERE connection_status.CHANNEL_NAME = ''";

const MEMBER_STATE_QUERY: &str = "\
SELECT MEMBER_STATE FROM performance_schema.replication_group_members \
WHERE MEMBER_HOST = ?";

// Online, and fewer than half of the group is outside ONLINE/RECOVERING.
const PRIMARY_PARTITION_QUERY: &str = "\
SELECT MEMBER_STATE = 'ONLINE' AND ( \
  (SELECT COUNT(*) FROM performance_schema.replication_group_members \
     WHERE MEMBER_STATE NOT IN ('ONLINE', 'RECOVERING')) \
  >= ((SELECT COUNT(*) FROM performance_schema.replication_group_members) / 2) \
) = 0 \
FROM performance_schema.replication_group_members \
JOIN performance_schema.replication_group_member_stats USING (MEMBER_ID) \
WHERE MEMBER_ID = @@global.server_uuid";

const DUMB_QUERY: &str = "SELECT 1";

#[derive(Debug, Default, Clone)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn MemberConnection>> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(endpoint.host.clone())
            .tcp_port(endpoint.port)
            .user(Some(endpoint.user.clone()))
            .pass(Some(endpoint.password.clone()))
            .prefer_socket(false);

        tracing::debug!(host = %endpoint.host, port = endpoint.port, user = %endpoint.user, "connecting");
        let conn = Conn::new(opts).await.map_err(|e| {
            Error::ConnectionFailed(format!("{}:{}: {}", endpoint.host, endpoint.port, e))
        })?;
        Ok(Box::new(MySqlMember { conn }))
    }
}

pub struct MySqlMember {
    conn: Conn,
}

#[async_trait]
impl MemberConnection for MySqlMember {
    async fn is_read_only(&mut self) -> Result<bool> {
        let value: Option<i64> = self.conn.query_first(READ_ONLY_QUERY).await?;
        Ok(value.unwrap_or(0) == 1)
    }

    async fn is_replica(&mut self) -> Result<bool> {
        let row: Option<(Option<String>, Option<String>)> =
            self.conn.query_first(REPLICATION_STATUS_QUERY).await?;
        Ok(match row {
            Some((Some(io), Some(sql))) => io == "ON" && sql == "ON",
            _ => false,
        })
    }

    async fn member_state(&mut self, fqdn: &str) -> Result<MemberState> {
        let state: Option<String> = self.conn.exec_first(MEMBER_STATE_QUERY, (fqdn,)).await?;
        Ok(match state {
            Some(raw) => raw.parse().unwrap_or(MemberState::Unknown),
            None => MemberState::Offline,
        })
    }

    async fn in_primary_partition(&mut self) -> Result<bool> {
        let value: Option<Option<i64>> = self.conn.query_first(PRIMARY_PARTITION_QUERY).await?;
        Ok(matches!(value, Some(Some(1))))
    }

    async fn dumb_query(&mut self) -> Result<()> {
        let _: Option<i64> = self.conn.query_first(DUMB_QUERY).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let MySqlMember { conn } = *self;
        conn.disconnect().await.context("disconnect")
    }
}
