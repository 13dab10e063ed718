//! Debug-only `/stats` endpoint (§10.5), reintroducing the byte-counter and
//! state-dump visibility the original single-process server printed on its
//! debug hook. Gated the same way the donor gates its XRPC dev proxy:
//! compiled only in debug builds, and further behind `ENABLE_METRICS` at
//! runtime so a debug build doesn't leak state in a shared environment.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::node::Node;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    server_id: u32,
    leader_id: Option<u32>,
    log_length: i64,
    commits_applied: u64,
    elections_started: u64,
    elections_won: u64,
    heartbeat_failures: u64,
    peer_unreachable: u64,
}

#[cfg(debug_assertions)]
pub async fn stats(State(node): State<Arc<Node>>) -> impl IntoResponse {
    if !node.config.enable_metrics {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    }

    let log_length = node.applier.storage().max_seq().await.unwrap_or(-1);
    Json(StatsResponse {
        server_id: node.config.server_id,
        leader_id: node.current_leader().await,
        log_length,
        commits_applied: node.metrics.commits_applied.load(Ordering::Relaxed),
        elections_started: node.metrics.elections_started.load(Ordering::Relaxed),
        elections_won: node.metrics.elections_won.load(Ordering::Relaxed),
        heartbeat_failures: node.metrics.heartbeat_failures.load(Ordering::Relaxed),
        peer_unreachable: node.metrics.peer_unreachable.load(Ordering::Relaxed),
    })
    .into_response()
}

#[cfg(not(debug_assertions))]
pub async fn stats(State(_node): State<Arc<Node>>) -> impl IntoResponse {
    axum::http::StatusCode::NOT_FOUND
}
