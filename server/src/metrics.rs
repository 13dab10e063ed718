//! Prometheus metrics, gated behind `ENABLE_METRICS` the way the donor gates
//! its own `/metrics` surface. Grounded on the donor's `MetricsRecorder`:
//! install one global recorder at startup, describe each series once, and
//! expose rendering through a thin axum handler.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::node::Node;

pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder");

        metrics::describe_counter!("ringchat_commits_applied_total", "Commits applied to the local log");
        metrics::describe_counter!("ringchat_elections_started_total", "Elections this node initiated");
        metrics::describe_counter!("ringchat_elections_won_total", "Elections this node won");
        metrics::describe_counter!("ringchat_heartbeat_failures_total", "Heartbeat probes that failed");
        metrics::describe_counter!("ringchat_peer_unreachable_total", "Peer RPCs classified unreachable");
        metrics::describe_gauge!("ringchat_leader_id", "Current known leader id, -1 if none");
        metrics::describe_gauge!("ringchat_log_length", "Number of commits in the local log");

        MetricsRecorder { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot the node's atomics into the `metrics` facade just before
/// rendering, rather than on every counter increment, since the recorder
/// already owns the actual series storage.
pub async fn metrics_handler(
    State((node, handle)): State<(Arc<Node>, PrometheusHandle)>,
) -> impl IntoResponse {
    metrics::counter!("ringchat_commits_applied_total")
        .absolute(node.metrics.commits_applied.load(Ordering::Relaxed));
    metrics::counter!("ringchat_elections_started_total")
        .absolute(node.metrics.elections_started.load(Ordering::Relaxed));
    metrics::counter!("ringchat_elections_won_total")
        .absolute(node.metrics.elections_won.load(Ordering::Relaxed));
    metrics::counter!("ringchat_heartbeat_failures_total")
        .absolute(node.metrics.heartbeat_failures.load(Ordering::Relaxed));
    metrics::counter!("ringchat_peer_unreachable_total")
        .absolute(node.metrics.peer_unreachable.load(Ordering::Relaxed));

    let leader_gauge = node.current_leader().await.map(|id| id as f64).unwrap_or(-1.0);
    metrics::gauge!("ringchat_leader_id").set(leader_gauge);

    if let Ok(seq) = node.applier.storage().max_seq().await {
        metrics::gauge!("ringchat_log_length").set(seq as f64);
    }

    (StatusCode::OK, handle.render())
}
