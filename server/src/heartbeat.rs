//! Heartbeat Monitor (SPEC_FULL.md §4.5): a background task, one per node,
//! that drives election initiation and leader-liveness checking on a fixed
//! interval. Grounded on the donor's interval-worker pattern (a
//! `tokio::spawn`ed loop with a `tokio::select!` between a `tick()` and a
//! shutdown signal) used throughout its actor registry reaper.

use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;

use crate::election::start_election;
use crate::node::SharedNode;

pub fn spawn(node: SharedNode) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(node.config.heartbeat_interval);
        loop {
            interval.tick().await;
            if node.is_shutting_down() {
                tracing::info!("heartbeat monitor stopping");
                break;
            }
            tick(&node).await;
        }
    })
}

async fn tick(node: &SharedNode) {
    let leader_id = node.current_leader().await;

    match leader_id {
        None => {
            tracing::debug!("no known leader, initiating election");
            start_election(node.clone()).await;
        }
        Some(id) if id == node.config.server_id => {
            // We are the leader; nothing to probe.
        }
        Some(id) => {
            let Some(addr) = node.config.peers.get(&id).cloned() else {
                tracing::warn!(leader_id = id, "leader id has no known address");
                return;
            };
            match node.peers.heartbeat(id, &addr, node.config.server_id).await {
                Ok(()) => {}
                Err(e) => {
                    node.metrics.heartbeat_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(leader_id = id, error = %e, "leader unreachable, clearing");
                    let mut leadership = node.leadership.lock().await;
                    leadership.leader_id = None;
                }
            }
        }
    }
}
