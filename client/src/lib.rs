//! External-Facing Dispatcher (SPEC_FULL.md §6): fans a client request out
//! to every node in the cluster in sequence and returns the last successful
//! response. Because every request carries a unique `id` and node-side
//! application is idempotent, delivering to every node — rather than just
//! the current leader — is safe and sidesteps the client needing to track
//! leadership itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(flatten)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no node in the cluster returned a successful response")]
    NoSuccess,
}

/// Fans a request out to every node address, in order, returning the last
/// response from a node that answered with a successful HTTP status — not
/// necessarily the last address tried. Matches the "last wins" semantics
/// the original implementation exhibited (SPEC_FULL.md §9 open question),
/// preserved here rather than tightened to "first OK wins".
pub struct Dispatcher {
    http: reqwest::Client,
    node_addrs: Vec<String>,
}

impl Dispatcher {
    pub fn new(node_addrs: Vec<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(500))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client builds with static TLS config");
        Dispatcher { http, node_addrs }
    }

    pub async fn dispatch(&self, request: &Request) -> Result<Response, DispatchError> {
        let mut last_success: Option<Response> = None;

        for addr in &self.node_addrs {
            let url = format!("http://{addr}/rpc/execute");
            match self.http.post(&url).json(request).send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<Response>().await {
                    Ok(body) => {
                        tracing::debug!(%addr, status = %body.status, "node responded");
                        last_success = Some(body);
                    }
                    Err(e) => tracing::warn!(%addr, error = %e, "unparseable response body"),
                },
                Ok(resp) => {
                    tracing::debug!(%addr, status = %resp.status(), "node returned non-success status")
                }
                Err(e) => tracing::debug!(%addr, error = %e, "node unreachable"),
            }
        }

        last_success.ok_or(DispatchError::NoSuccess)
    }
}
