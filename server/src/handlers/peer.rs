//! Node-to-node RPC handlers: `Heartbeat`, `Election`, `Coordinator`,
//! `GetCommits` (§6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::election;
use crate::models::Commit;
use crate::node::Node;

#[derive(Debug, Serialize)]
pub struct Ack {}

#[derive(Debug, Deserialize)]
pub struct HeartbeatBody {
    pub from: u32,
}

pub async fn heartbeat(
    State(node): State<Arc<Node>>,
    Json(body): Json<HeartbeatBody>,
) -> impl IntoResponse {
    tracing::debug!(from = body.from, "heartbeat received");
    let _ = node;
    (axum::http::StatusCode::OK, Json(Ack {}))
}

#[derive(Debug, Deserialize)]
pub struct ElectionBody {
    pub from: u32,
}

pub async fn election_rpc(
    State(node): State<Arc<Node>>,
    Json(body): Json<ElectionBody>,
) -> impl IntoResponse {
    match election::on_election(node, body.from) {
        Ok(()) => (axum::http::StatusCode::OK, Json(Ack {})).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CoordinatorBody {
    pub leader_id: u32,
    #[serde(default)]
    pub commit_history: Vec<Commit>,
}

pub async fn coordinator(
    State(node): State<Arc<Node>>,
    Json(body): Json<CoordinatorBody>,
) -> impl IntoResponse {
    match election::on_coordinator(&node, body.leader_id, body.commit_history).await {
        Ok(()) => (axum::http::StatusCode::OK, Json(Ack {})).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct GetCommitsParams {
    #[serde(default)]
    pub after: i64,
}

pub async fn get_commits(
    State(node): State<Arc<Node>>,
    Query(params): Query<GetCommitsParams>,
) -> impl IntoResponse {
    match node.applier.storage().commits_after(params.after).await {
        Ok(commits) => Json(commits).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "storage failure serving get_commits");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
