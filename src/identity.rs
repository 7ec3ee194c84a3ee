//! Pod identity: network address and fully-qualified member name

use crate::common::{Config, Error, Result, ResultExt};
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait PodIdentity: Send + Sync {
    /// Address the local MySQL is reachable at.
    async fn pod_address(&self) -> Result<String>;

    /// `<hostname>.<service>.<namespace>`, as group replication knows us.
    async fn pod_fqdn(&self, service_name: &str) -> Result<String>;
}

/// Identity derived from the downward API / service account mount.
#[derive(Debug, Clone)]
pub struct KubernetesIdentity {
    hostname: Option<String>,
    pod_ip: Option<String>,
    namespace_file: PathBuf,
}

impl KubernetesIdentity {
    pub fn new(hostname: Option<String>, pod_ip: Option<String>, namespace_file: PathBuf) -> Self {
        Self {
            hostname,
            pod_ip,
            namespace_file,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.hostname.clone(),
            config.pod_ip.clone(),
            config.namespace_file.clone(),
        )
    }

    async fn hostname(&self) -> Result<String> {
        if let Some(hostname) = self.hostname.as_deref().filter(|h| !h.is_empty()) {
            return Ok(hostname.to_string());
        }
        let raw = tokio::fs::read_to_string("/etc/hostname")
            .await
            .context("get hostname")?;
        Ok(raw.trim().to_string())
    }

    async fn namespace(&self) -> Result<String> {
        let raw = tokio::fs::read_to_string(&self.namespace_file)
            .await
            .context(format!("read {}", self.namespace_file.display()))?;
        let namespace = raw.trim();
        if namespace.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{} is empty",
                self.namespace_file.display()
            )));
        }
        Ok(namespace.to_string())
    }
}

#[async_trait]
impl PodIdentity for KubernetesIdentity {
    async fn pod_address(&self) -> Result<String> {
        if let Some(ip) = self.pod_ip.as_deref().filter(|ip| !ip.is_empty()) {
            return Ok(ip.to_string());
        }
        let hostname = self.hostname().await?;
        let mut addrs = tokio::net::lookup_host((hostname.as_str(), 0))
            .await
            .context(format!("lookup {}", hostname))?;
        addrs
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| Error::ConnectionFailed(format!("lookup {}: no addresses", hostname)))
    }

    async fn pod_fqdn(&self, service_name: &str) -> Result<String> {
        let hostname = self.hostname().await?;
        let namespace = self.namespace().await.context("get namespace")?;
        Ok(format!("{}.{}.{}", hostname, service_name, namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fqdn_from_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        let ns = dir.path().join("namespace");
        std::fs::write(&ns, "databases\n").unwrap();

        let identity = KubernetesIdentity::new(Some("cluster1-mysql-0".into()), None, ns);
        assert_eq!(
            identity.pod_fqdn("cluster1-mysql").await.unwrap(),
            "cluster1-mysql-0.cluster1-mysql.databases"
        );
    }

    #[tokio::test]
    async fn test_pod_ip_override() {
        let identity =
            KubernetesIdentity::new(Some("x".into()), Some("10.1.2.3".into()), "/nonexistent".into());
        assert_eq!(identity.pod_address().await.unwrap(), "10.1.2.3");
    }

    #[tokio::test]
    async fn test_missing_namespace_is_wrapped() {
        let identity = KubernetesIdentity::new(Some("x".into()), None, "/nonexistent/ns".into());
        let err = identity.pod_fqdn("svc").await.unwrap_err();
        assert!(err.to_string().starts_with("get namespace: read /nonexistent/ns"));
    }
}
