//! Client-facing `Execute` RPC (§6): `{id, request_type, ...} -> Response`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::Request;
use crate::node::Node;

#[tracing::instrument(skip(node, request), fields(request_id = %request.id))]
pub async fn execute(
    State(node): State<Arc<Node>>,
    Json(request): Json<Request>,
) -> impl IntoResponse {
    match node.applier.apply(&request).await {
        Ok(response) => {
            tracing::debug!(duplicate = response.duplicate, "request applied");
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
