//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mysql_sidecar::bootstrap::Bootstrapper;
use mysql_sidecar::common::{Config, Error, Result};
use mysql_sidecar::db::{Connector, Endpoint, MemberConnection, MemberState};
use mysql_sidecar::identity::PodIdentity;
use mysql_sidecar::markers::BOOTSTRAP_LOCK_FILE;
use mysql_sidecar::topology::{
    AsyncReplicationStrategy, GroupReplicationStrategy, JoinProcedure, JoinRequest,
};
use mysql_sidecar::{Dispatcher, HealthEvaluator};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const MONITOR_PASSWORD: &str = "monitor-pass";

/// What the fake member reports.
#[derive(Debug, Clone)]
pub struct MemberScript {
    pub read_only: bool,
    pub replica: bool,
    pub member_state: MemberState,
    pub in_primary_partition: bool,
    pub dumb_query_fails: bool,
    pub connect_error: Option<String>,
    pub query_delay: Option<Duration>,
}

impl Default for MemberScript {
    fn default() -> Self {
        Self {
            read_only: true,
            replica: true,
            member_state: MemberState::Online,
            in_primary_partition: true,
            dumb_query_fails: false,
            connect_error: None,
            query_delay: None,
        }
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub script: Mutex<MemberScript>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub queries: AtomicUsize,
    pub last_endpoint: Mutex<Option<Endpoint>>,
    pub last_fqdn: Mutex<Option<String>>,
}

impl FakeCluster {
    pub fn set(&self, f: impl FnOnce(&mut MemberScript)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn script(&self) -> MemberScript {
        self.script.lock().unwrap().clone()
    }
}

pub struct FakeConnector(pub Arc<FakeCluster>);

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn MemberConnection>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        *self.0.last_endpoint.lock().unwrap() = Some(endpoint.clone());
        if let Some(err) = self.0.script().connect_error {
            return Err(Error::ConnectionFailed(err));
        }
        Ok(Box::new(FakeConn(self.0.clone())))
    }
}

pub struct FakeConn(Arc<FakeCluster>);

impl FakeConn {
    async fn query(&self) -> MemberScript {
        self.0.queries.fetch_add(1, Ordering::SeqCst);
        let script = self.0.script();
        if let Some(delay) = script.query_delay {
            tokio::time::sleep(delay).await;
        }
        script
    }
}

#[async_trait]
impl MemberConnection for FakeConn {
    async fn is_read_only(&mut self) -> Result<bool> {
        Ok(self.query().await.read_only)
    }

    async fn is_replica(&mut self) -> Result<bool> {
        Ok(self.query().await.replica)
    }

    async fn member_state(&mut self, fqdn: &str) -> Result<MemberState> {
        *self.0.last_fqdn.lock().unwrap() = Some(fqdn.to_string());
        Ok(self.query().await.member_state)
    }

    async fn in_primary_partition(&mut self) -> Result<bool> {
        Ok(self.query().await.in_primary_partition)
    }

    async fn dumb_query(&mut self) -> Result<()> {
        if self.query().await.dumb_query_fails {
            return Err(Error::ConnectionFailed("server has gone away".into()));
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeIdentity;

#[async_trait]
impl PodIdentity for FakeIdentity {
    async fn pod_address(&self) -> Result<String> {
        Ok("127.0.0.1".to_string())
    }

    async fn pod_fqdn(&self, service_name: &str) -> Result<String> {
        Ok(format!("mysql-0.{}.test", service_name))
    }
}

/// Join procedure that records each run and whether the lock existed then.
pub struct FakeProcedure {
    pub runs: AtomicUsize,
    pub fail: Mutex<bool>,
    pub delay: Mutex<Option<Duration>>,
    pub lock_present_at_run: Mutex<Vec<bool>>,
    pub requests: Mutex<Vec<JoinRequest>>,
    lock_path: PathBuf,
}

impl FakeProcedure {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JoinProcedure for FakeProcedure {
    async fn run(&self, request: &JoinRequest) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.lock_present_at_run
            .lock()
            .unwrap()
            .push(self.lock_path.exists());
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock().unwrap() {
            return Err(Error::BootstrapFailed("join exited with 1".into()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub cluster: Arc<FakeCluster>,
    pub procedure: Arc<FakeProcedure>,
}

impl Harness {
    pub fn new(cluster_type: Option<&str>) -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let creds = dir.path().join("secrets");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::create_dir_all(&creds).unwrap();
        std::fs::write(creds.join("monitor"), format!("{}\n", MONITOR_PASSWORD)).unwrap();

        let config = Config {
            cluster_type: cluster_type.map(str::to_string),
            service_name: "cluster1-mysql".into(),
            data_dir: data_dir.clone(),
            creds_mount_path: creds,
            bootstrap_settle_secs: 0,
            ..Config::default()
        };

        let procedure = Arc::new(FakeProcedure {
            runs: AtomicUsize::new(0),
            fail: Mutex::new(false),
            delay: Mutex::new(None),
            lock_present_at_run: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            lock_path: data_dir.join(BOOTSTRAP_LOCK_FILE),
        });

        Self {
            dir,
            config,
            cluster: Arc::new(FakeCluster::default()),
            procedure,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new()
            .register(Arc::new(GroupReplicationStrategy::new(
                self.procedure.clone(),
            )))
            .register(Arc::new(AsyncReplicationStrategy::new(
                self.procedure.clone(),
            )))
    }

    pub fn evaluator(&self) -> HealthEvaluator {
        HealthEvaluator::new(
            &self.config,
            self.dispatcher(),
            Arc::new(FakeConnector(self.cluster.clone())),
            Arc::new(FakeIdentity),
        )
    }

    pub fn bootstrapper(&self) -> Bootstrapper {
        Bootstrapper::new(&self.config, self.dispatcher(), Arc::new(FakeIdentity))
    }

    pub fn marker(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(name)
    }

    pub fn touch(&self, name: &str) {
        std::fs::write(self.marker(name), b"").unwrap();
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.marker(name)).unwrap();
    }
}
