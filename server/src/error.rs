//! Error taxonomy for the node. Mirrors the donor's `FederationError`/
//! `OutboundError` split: one enum per concern, each variant carrying what
//! it needs to log and respond without re-deriving context at the call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Json;

use crate::models::Response;

/// Errors raised while validating and applying a client request.
///
/// Validation variants are returned to the client as `{status:"ERROR",
/// error_message}` (§7); `Storage` is fatal and propagates as a 500 after
/// rolling back any in-flight transaction.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Username already exists.")]
    UsernameExists,

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Recipient does not exist.")]
    RecipientNotFound,

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ApplyError {
    /// Validation failures become a normal `{status:"ERROR"}` response body;
    /// a storage failure has no safe response (the transaction may not have
    /// committed) and is surfaced as a hard error instead.
    pub fn into_response_body(self) -> Result<Response, sqlx::Error> {
        match self {
            ApplyError::Storage(e) => Err(e),
            other => Ok(Response::error(other.to_string())),
        }
    }
}

impl IntoResponse for ApplyError {
    fn into_response(self) -> AxumResponse {
        match self {
            ApplyError::Storage(e) => {
                tracing::error!(error = %e, "storage failure while applying request");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
            other => (StatusCode::OK, Json(Response::error(other.to_string()))).into_response(),
        }
    }
}

/// Outcomes of an outbound peer RPC (§4.3). `Unreachable` collapses
/// connection failures, timeouts, and invalid responses into the single
/// "treat this peer as absent for this round" outcome the design calls for;
/// `Remote` is a well-formed error returned by the peer's business logic.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer {peer_id} unreachable: {reason}")]
    Unreachable { peer_id: u32, reason: String },

    #[error("peer {peer_id} returned an error: {status}")]
    Remote { peer_id: u32, status: u16 },
}

impl TransportError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable { .. })
    }
}

/// Violations of the Bully protocol's ordering invariants (I5, P5). The
/// design treats these as fatal to the calling RPC: the design's
/// correctness model has no graceful recovery from a peer lying about its
/// `server_id`.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("rejected Coordinator from leader {leader_id}: not greater than self ({self_id})")]
    CoordinatorNotGreater { leader_id: u32, self_id: u32 },

    #[error("rejected Election from candidate {candidate_id}: not less than self ({self_id})")]
    ElectionNotLesser { candidate_id: u32, self_id: u32 },
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> AxumResponse {
        tracing::error!(error = %self, "protocol invariant violation");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
