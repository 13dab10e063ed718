//! The node facade: owns the applier, the peer transport, and the Bully
//! leadership state (`leader_id`, `election_in_progress`) behind one mutex,
//! the way the donor's `AppState` bundles its pool, actor registry, and
//! outbound client behind a single `Arc` handed to every handler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::applier::Applier;
use crate::config::NodeConfig;
use crate::transport::PeerClient;

/// Leadership state guarded together because the Bully procedure reads and
/// writes both atomically (§4.4, §5 "single process-wide mutex").
pub struct LeadershipState {
    pub leader_id: Option<u32>,
}

pub struct NodeMetrics {
    pub commits_applied: AtomicU64,
    pub elections_started: AtomicU64,
    pub elections_won: AtomicU64,
    pub heartbeat_failures: AtomicU64,
    pub peer_unreachable: AtomicU64,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        NodeMetrics {
            commits_applied: AtomicU64::new(0),
            elections_started: AtomicU64::new(0),
            elections_won: AtomicU64::new(0),
            heartbeat_failures: AtomicU64::new(0),
            peer_unreachable: AtomicU64::new(0),
        }
    }
}

pub struct Node {
    pub config: NodeConfig,
    pub applier: Applier,
    pub peers: PeerClient,
    pub leadership: Mutex<LeadershipState>,
    /// Single-flight guard for election initiation (I4). Separate from
    /// `leadership` because a reader needs to check it without holding the
    /// leadership lock across the (potentially slow) election procedure.
    pub election_in_progress: AtomicBool,
    pub metrics: NodeMetrics,
    pub shutdown: AtomicBool,
}

pub type SharedNode = Arc<Node>;

impl Node {
    pub fn new(config: NodeConfig, applier: Applier) -> SharedNode {
        let peers = PeerClient::new(config.rpc_timeout, config.election_timeout);
        Arc::new(Node {
            config,
            applier,
            peers,
            leadership: Mutex::new(LeadershipState { leader_id: None }),
            election_in_progress: AtomicBool::new(false),
            metrics: NodeMetrics::default(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub async fn current_leader(&self) -> Option<u32> {
        self.leadership.lock().await.leader_id
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}
