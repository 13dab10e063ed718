//! Outbound peer RPC client. Mirrors the donor's `OutboundClient` shape — a
//! thin wrapper around a single shared `reqwest::Client`, one method per
//! call kind, every failure mode collapsed into `TransportError` so callers
//! never have to match on `reqwest::Error` directly.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::TransportError;
use crate::models::{Commit, Request, Response};

#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    /// Dedicated short timeout for `Election`/`Heartbeat` calls (§4.3, §4.4
    /// step 1: "each with the election timeout"). `Execute`/`Coordinator`/
    /// `GetCommits` use the client's default (`rpc_timeout`) instead.
    election_timeout: Duration,
}

impl PeerClient {
    pub fn new(rpc_timeout: Duration, election_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(500))
            .timeout(rpc_timeout)
            .build()
            .expect("reqwest client builds with static TLS config");
        PeerClient { http, election_timeout }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        peer_id: u32,
        url: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        let mut req = self.http.post(url).json(body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Unreachable { peer_id, reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(TransportError::Remote { peer_id, status: resp.status().as_u16() });
        }

        resp.json::<T>()
            .await
            .map_err(|e| TransportError::Unreachable { peer_id, reason: e.to_string() })
    }

    /// Forward a client request to a peer, used by the leader to replicate
    /// and by a follower redirecting a write it cannot itself commit to.
    pub async fn execute(
        &self,
        peer_id: u32,
        addr: &str,
        request: &Request,
    ) -> Result<Response, TransportError> {
        self.post_json(peer_id, &format!("http://{addr}/rpc/execute"), request, None).await
    }

    /// Liveness probe sent by the leader to followers (§5.1). Uses the
    /// dedicated election timeout, not the general RPC timeout, so a dead
    /// leader is detected within the short window §4.5 relies on.
    pub async fn heartbeat(&self, peer_id: u32, addr: &str, from: u32) -> Result<(), TransportError> {
        #[derive(Serialize)]
        struct Body {
            from: u32,
        }
        #[derive(serde::Deserialize)]
        struct Ack {}
        let _: Ack = self
            .post_json(
                peer_id,
                &format!("http://{addr}/rpc/heartbeat"),
                &Body { from },
                Some(self.election_timeout),
            )
            .await?;
        Ok(())
    }

    /// Send an Election message to a higher-id peer (§5.2), bounded by the
    /// election timeout (§4.4 step 1).
    pub async fn election(&self, peer_id: u32, addr: &str, from: u32) -> Result<(), TransportError> {
        #[derive(Serialize)]
        struct Body {
            from: u32,
        }
        #[derive(serde::Deserialize)]
        struct Ack {}
        let _: Ack = self
            .post_json(
                peer_id,
                &format!("http://{addr}/rpc/election"),
                &Body { from },
                Some(self.election_timeout),
            )
            .await?;
        Ok(())
    }

    /// Announce the new leader to a peer (§5.2).
    pub async fn coordinator(
        &self,
        peer_id: u32,
        addr: &str,
        leader_id: u32,
        commit_history: &[Commit],
    ) -> Result<(), TransportError> {
        #[derive(Serialize)]
        struct Body<'a> {
            leader_id: u32,
            commit_history: &'a [Commit],
        }
        #[derive(serde::Deserialize)]
        struct Ack {}
        let _: Ack = self
            .post_json(
                peer_id,
                &format!("http://{addr}/rpc/coordinator"),
                &Body { leader_id, commit_history },
                None,
            )
            .await?;
        Ok(())
    }

    /// Pull every commit a peer holds after `after_seq` (§4.4a).
    pub async fn get_commits(
        &self,
        peer_id: u32,
        addr: &str,
        after_seq: i64,
    ) -> Result<Vec<Commit>, TransportError> {
        let url = format!("http://{addr}/rpc/commits?after={after_seq}");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable { peer_id, reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(TransportError::Remote { peer_id, status: resp.status().as_u16() });
        }

        resp.json::<Vec<Commit>>()
            .await
            .map_err(|e| TransportError::Unreachable { peer_id, reason: e.to_string() })
    }
}
