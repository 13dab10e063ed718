//! Node configuration, loaded from the environment the way the donor's
//! `DbConfig::default()` reads `std::env::var` with typed fallbacks.
//! Cluster membership and RPC framing are explicitly out of scope for deep
//! validation (SPEC_FULL.md §1) — this is a thin, directly testable loader,
//! not a general configuration framework.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};

/// Static cluster membership: `server_id -> "host:port"`, identical on every
/// node (SPEC_FULL.md §6).
pub type ClusterMap = HashMap<u32, String>;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub server_id: u32,
    pub bind_addr: String,
    pub peers: ClusterMap,
    pub db_path: String,
    pub heartbeat_interval: Duration,
    pub election_timeout: Duration,
    pub rpc_timeout: Duration,
    pub enable_metrics: bool,
}

impl NodeConfig {
    /// Load configuration from the environment.
    ///
    /// Required: `NODE_ID`, `NODE_BIND_ADDR`, `CLUSTER_CONFIG_PATH` (a JSON
    /// object mapping `server_id` to `"host:port"`, covering every node
    /// including self).
    pub fn from_env() -> Result<Self> {
        let server_id: u32 = std::env::var("NODE_ID")
            .context("NODE_ID must be set")?
            .parse()
            .context("NODE_ID must be a positive integer")?;

        let bind_addr =
            std::env::var("NODE_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let cluster_path = std::env::var("CLUSTER_CONFIG_PATH")
            .context("CLUSTER_CONFIG_PATH must be set")?;
        let raw = std::fs::read_to_string(&cluster_path)
            .with_context(|| format!("failed to read cluster config at {cluster_path}"))?;
        let peers: ClusterMap =
            serde_json::from_str(&raw).context("cluster config must be a JSON object")?;

        let db_path = std::env::var("NODE_DB_PATH")
            .unwrap_or_else(|_| format!("ringchat-node-{server_id}.sqlite"));

        let heartbeat_interval = Duration::from_millis(
            std::env::var("HEARTBEAT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
        );
        let election_timeout = Duration::from_millis(
            std::env::var("ELECTION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
        );
        let rpc_timeout = Duration::from_millis(
            std::env::var("RPC_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
        );

        let enable_metrics = matches!(
            std::env::var("ENABLE_METRICS").as_deref(),
            Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
        );

        Ok(NodeConfig {
            server_id,
            bind_addr,
            peers,
            db_path,
            heartbeat_interval,
            election_timeout,
            rpc_timeout,
            enable_metrics,
        })
    }

    /// Peer addresses excluding self.
    pub fn other_peers(&self) -> impl Iterator<Item = (u32, &str)> {
        self.peers
            .iter()
            .filter(move |(id, _)| **id != self.server_id)
            .map(|(id, addr)| (*id, addr.as_str()))
    }

    pub fn peer_ids_greater_than_self(&self) -> Vec<u32> {
        let mut ids: Vec<u32> =
            self.peers.keys().copied().filter(|id| *id > self.server_id).collect();
        ids.sort_unstable();
        ids
    }
}
