//! HTTP probe surface
//!
//! Status code is the signal the orchestrator acts on; bodies are plain
//! diagnostic text for operators.

use crate::bootstrap::BootstrapStatus;
use crate::common::metrics::METRICS;
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::health::{HealthEvaluator, HealthVerdict, ProbeKind};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct ProbeState {
    pub evaluator: Arc<HealthEvaluator>,
    /// Present when bootstrap runs inside this process.
    pub bootstrap: Option<watch::Receiver<BootstrapStatus>>,
    pub cluster_type: Option<String>,
}

pub fn create_router(state: ProbeState) -> Router {
    Router::new()
        .route("/startup", get(startup))
        .route("/readiness", get(readiness))
        .route("/liveness", get(liveness))
        .route("/replication", get(replication))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

/// Startup probe: 200 once this data directory is bootstrapped.
async fn startup(State(state): State<ProbeState>) -> impl IntoResponse {
    let markers = state.evaluator.markers();

    let gate = markers.check();
    if gate.is_terminal() {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("{}. exiting...", gate));
    }

    let status = match &state.bootstrap {
        Some(rx) => rx.borrow().clone(),
        // bootstrap is run by a separate one-shot process; trust its lock
        None if markers.bootstrap_lock_present() => BootstrapStatus::AlreadyBootstrapped,
        None => BootstrapStatus::Pending,
    };

    match status {
        BootstrapStatus::Completed | BootstrapStatus::AlreadyBootstrapped => {
            (StatusCode::OK, "Startup probe successful".to_string())
        }
        BootstrapStatus::Skipped(gate) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}. exiting...", gate))
        }
        BootstrapStatus::Pending | BootstrapStatus::Running => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "bootstrap in progress".to_string(),
        ),
        BootstrapStatus::Failed(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("bootstrap failed: {}", reason),
        ),
    }
}

async fn readiness(State(state): State<ProbeState>) -> impl IntoResponse {
    probe(&state, ProbeKind::Readiness).await
}

async fn liveness(State(state): State<ProbeState>) -> impl IntoResponse {
    probe(&state, ProbeKind::Liveness).await
}

async fn replication(State(state): State<ProbeState>) -> impl IntoResponse {
    probe(&state, ProbeKind::Replication).await
}

async fn probe(state: &ProbeState, kind: ProbeKind) -> (StatusCode, String) {
    if let Some(rx) = &state.bootstrap {
        let proceed = matches!(
            &*rx.borrow(),
            BootstrapStatus::Completed
                | BootstrapStatus::AlreadyBootstrapped
                | BootstrapStatus::Skipped(_)
        );
        if !proceed {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "not yet bootstrapped".to_string(),
            );
        }
    }

    match state.evaluator.evaluate(kind).await {
        HealthVerdict::Pass => (StatusCode::OK, format!("{} check passed", kind.title())),
        HealthVerdict::Skipped(gate) => (
            StatusCode::OK,
            format!("{}, skipping {} check", gate, kind),
        ),
        HealthVerdict::Fail(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} check failed: {}", kind, reason),
        ),
    }
}

/// Diagnostic snapshot for operators.
async fn status(State(state): State<ProbeState>) -> impl IntoResponse {
    let markers = state.evaluator.markers();
    let bootstrap = state.bootstrap.as_ref().map(|rx| rx.borrow().clone());
    axum::Json(json!({
        "cluster_type": state.cluster_type,
        "gate": markers.check(),
        "bootstrap_lock": markers.bootstrap_lock_present(),
        "bootstrap": bootstrap,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics() -> impl IntoResponse {
    (StatusCode::OK, METRICS.to_prometheus())
}
