//! Health evaluator against a scripted member

mod common;

use common::{Harness, MONITOR_PASSWORD};
use mysql_sidecar::db::MemberState;
use mysql_sidecar::markers::{
    BOOTSTRAP_LOCK_FILE, FULL_CLUSTER_CRASH_FILE, MANUAL_RECOVERY_FILE,
};
use mysql_sidecar::{HealthVerdict, ProbeKind};
use std::time::Duration;

fn fail_reason(verdict: HealthVerdict) -> String {
    match verdict {
        HealthVerdict::Fail(reason) => reason,
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_async_readiness_truth_table() {
    // (read_only, replica, ready)
    let table = [
        (true, true, true),
        (true, false, true),
        (false, false, true),
        (false, true, false),
    ];

    for (read_only, replica, ready) in table {
        let h = Harness::new(Some("async"));
        h.touch(BOOTSTRAP_LOCK_FILE);
        h.cluster.set(|s| {
            s.read_only = read_only;
            s.replica = replica;
        });

        let verdict = h.evaluator().evaluate(ProbeKind::Readiness).await;
        assert_eq!(verdict.is_pass(), ready, "ro={} replica={}", read_only, replica);
        if !ready {
            assert!(fail_reason(verdict).contains("replica is not read only"));
        }
        assert_eq!(h.cluster.closes(), h.cluster.connects());
    }
}

#[tokio::test]
async fn test_async_readiness_waits_for_bootstrap_lock() {
    let h = Harness::new(Some("async"));

    let verdict = h.evaluator().evaluate(ProbeKind::Readiness).await;
    assert!(fail_reason(verdict).contains("bootstrap not complete"));
    assert_eq!(h.cluster.connects(), 0);
}

#[tokio::test]
async fn test_async_liveness_is_responsiveness_only() {
    let h = Harness::new(Some("async"));
    // writable replica fails readiness but not liveness
    h.cluster.set(|s| {
        s.read_only = false;
        s.replica = true;
    });
    assert_eq!(
        h.evaluator().evaluate(ProbeKind::Liveness).await,
        HealthVerdict::Pass
    );

    h.cluster.set(|s| s.dumb_query_fails = true);
    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Liveness).await);
    assert!(reason.contains("dumb query"));
    assert!(reason.contains("server has gone away"));
}

#[tokio::test]
async fn test_group_replication_readiness_by_member_state() {
    let states = [
        (MemberState::Online, true),
        (MemberState::Recovering, false),
        (MemberState::Offline, false),
        (MemberState::Unreachable, false),
        (MemberState::Error, false),
        (MemberState::Unknown, false),
    ];

    for (state, ready) in states {
        let h = Harness::new(Some("group-replication"));
        h.cluster.set(|s| s.member_state = state);

        let verdict = h.evaluator().evaluate(ProbeKind::Readiness).await;
        assert_eq!(verdict.is_pass(), ready, "{}", state);
        if !ready {
            assert!(fail_reason(verdict).contains(&format!("Member state: {}", state)));
        }
        assert_eq!(
            h.cluster.last_fqdn.lock().unwrap().as_deref(),
            Some("mysql-0.cluster1-mysql.test")
        );
    }
}

#[tokio::test]
async fn test_recovering_member_message() {
    let h = Harness::new(Some("group-replication"));
    h.cluster.set(|s| s.member_state = MemberState::Recovering);

    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Readiness).await);
    assert!(reason.contains("Member state: Recovering"));
}

#[tokio::test]
async fn test_group_replication_liveness_split_brain() {
    let h = Harness::new(Some("group-replication"));
    assert_eq!(
        h.evaluator().evaluate(ProbeKind::Liveness).await,
        HealthVerdict::Pass
    );

    h.cluster.set(|s| s.in_primary_partition = false);
    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Liveness).await);
    assert!(reason.contains("possible split brain!"));
}

#[tokio::test]
async fn test_group_replication_readiness_ignores_lock() {
    let h = Harness::new(Some("group-replication"));
    assert!(!h.marker(BOOTSTRAP_LOCK_FILE).exists());
    assert_eq!(
        h.evaluator().evaluate(ProbeKind::Readiness).await,
        HealthVerdict::Pass
    );
}

#[tokio::test]
async fn test_replication_probe() {
    let h = Harness::new(Some("async"));
    assert_eq!(
        h.evaluator().evaluate(ProbeKind::Replication).await,
        HealthVerdict::Pass
    );

    h.cluster.set(|s| s.replica = false);
    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Replication).await);
    assert!(reason.contains("replication is not active"));
}

#[tokio::test]
async fn test_replication_probe_without_cluster_type() {
    let h = Harness::new(None);
    assert_eq!(
        h.evaluator().evaluate(ProbeKind::Replication).await,
        HealthVerdict::Pass
    );
}

#[tokio::test]
async fn test_terminal_markers_skip_without_touching_database() {
    for marker in [FULL_CLUSTER_CRASH_FILE, MANUAL_RECOVERY_FILE] {
        for kind in [ProbeKind::Readiness, ProbeKind::Liveness, ProbeKind::Replication] {
            let h = Harness::new(Some("group-replication"));
            h.touch(marker);
            h.cluster.set(|s| s.member_state = MemberState::Error);

            let verdict = h.evaluator().evaluate(kind).await;
            assert!(matches!(verdict, HealthVerdict::Skipped(_)), "{} {}", marker, kind);
            assert!(verdict.is_pass());
            assert_eq!(h.cluster.connects(), 0);
            assert_eq!(h.cluster.queries(), 0);
        }
    }
}

#[tokio::test]
async fn test_connects_as_monitor_user_on_admin_port() {
    let h = Harness::new(Some("group-replication"));
    h.evaluator().evaluate(ProbeKind::Liveness).await;

    let endpoint = h.cluster.last_endpoint.lock().unwrap().clone().unwrap();
    assert_eq!(endpoint.host, "127.0.0.1");
    assert_eq!(endpoint.port, 33062);
    assert_eq!(endpoint.user, "monitor");
    assert_eq!(endpoint.password, MONITOR_PASSWORD);
}

#[tokio::test]
async fn test_connection_closed_on_failure_paths() {
    let h = Harness::new(Some("group-replication"));
    h.cluster.set(|s| {
        s.member_state = MemberState::Offline;
        s.in_primary_partition = false;
    });
    let evaluator = h.evaluator();

    for kind in [ProbeKind::Readiness, ProbeKind::Liveness, ProbeKind::Replication] {
        evaluator.evaluate(kind).await;
    }
    assert_eq!(h.cluster.connects(), 3);
    assert_eq!(h.cluster.closes(), 3);
}

#[tokio::test]
async fn test_connect_failure_is_wrapped() {
    let h = Harness::new(Some("async"));
    h.cluster.set(|s| s.connect_error = Some("connection refused".into()));

    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Liveness).await);
    assert!(reason.contains("connect to db"));
    assert!(reason.contains("connection refused"));
}

#[tokio::test]
async fn test_missing_password_is_wrapped() {
    let h = Harness::new(Some("async"));
    std::fs::remove_file(h.config.creds_mount_path.join("monitor")).unwrap();

    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Liveness).await);
    assert!(reason.contains("get monitor password"));
    assert_eq!(h.cluster.connects(), 0);
}

#[tokio::test]
async fn test_missing_cluster_type_fails_probe() {
    let h = Harness::new(None);
    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Readiness).await);
    assert!(reason.contains("CLUSTER_TYPE"));
    assert_eq!(h.cluster.connects(), 0);
}

#[tokio::test]
async fn test_probe_deadline() {
    let mut h = Harness::new(Some("group-replication"));
    h.config.probe_timeout_secs = 1;
    h.cluster.set(|s| s.query_delay = Some(Duration::from_secs(30)));

    let reason = fail_reason(h.evaluator().evaluate(ProbeKind::Liveness).await);
    assert!(reason.contains("liveness probe exceeded"));
}
