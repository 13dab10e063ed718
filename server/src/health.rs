//! Liveness/readiness endpoints, grounded on the donor's `health.rs` trio of
//! probes (simplified: no actor-system check, since this node has nothing
//! analogous — storage reachability is the only readiness dependency).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::node::Node;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: CheckStatus,
    server_id: u32,
    leader_id: Option<u32>,
    log_length: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    ready: bool,
    storage_ready: bool,
}

/// Liveness probe: the process is running and able to answer HTTP.
pub async fn liveness() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Readiness probe: storage is reachable.
pub async fn readiness(State(node): State<Arc<Node>>) -> (StatusCode, Json<ReadinessResponse>) {
    let storage_ready = node.applier.storage().max_seq().await.is_ok();
    let status =
        if storage_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(ReadinessResponse { ready: storage_ready, storage_ready }))
}

/// Detailed health: leader knowledge and log length alongside liveness.
pub async fn health(State(node): State<Arc<Node>>) -> (StatusCode, Json<HealthResponse>) {
    let log_length = node.applier.storage().max_seq().await.unwrap_or(-1);
    let healthy = log_length >= 0;

    let status = if healthy { CheckStatus::Healthy } else { CheckStatus::Unhealthy };
    let code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        code,
        Json(HealthResponse {
            status,
            server_id: node.config.server_id,
            leader_id: node.current_leader().await,
            log_length,
        }),
    )
}
