//! The Bully election engine (SPEC_FULL.md §4.4) and commit synchronization
//! (§4.4a). Grounded on the donor's `federation/sequencer.rs`, which runs a
//! comparable "compare-and-swap against peers, then broadcast the winner"
//! flow for epoch ordering — here the comparison is on `server_id` rather
//! than a CAS token, and the broadcast carries a leader id instead of a
//! sequence number.

use std::sync::atomic::Ordering;

use crate::error::ProtocolError;
use crate::models::{Commit, Request};
use crate::node::SharedNode;

/// Entry point for both triggers in §4.4: the heartbeat monitor observing
/// `leader_id = none`, and an `Election` RPC from a lower-id peer. Enforces
/// single-flight (I4) via `election_in_progress`.
pub async fn start_election(node: SharedNode) {
    if node
        .election_in_progress
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        tracing::debug!("election already in progress, ignoring trigger");
        return;
    }

    {
        let mut leadership = node.leadership.lock().await;
        leadership.leader_id = None;
    }

    node.metrics.elections_started.fetch_add(1, Ordering::Relaxed);
    tracing::info!(server_id = node.config.server_id, "starting election");

    let higher_peers = node.config.peer_ids_greater_than_self();
    let mut accepted = true;

    for peer_id in &higher_peers {
        let Some(addr) = node.config.peers.get(peer_id) else { continue };
        match node.peers.election(*peer_id, addr, node.config.server_id).await {
            Ok(()) => {
                // A higher-id peer acknowledged: it will take over.
                accepted = false;
            }
            Err(e) if e.is_unreachable() => {
                node.metrics.peer_unreachable.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(peer_id, error = %e, "peer unreachable during election");
            }
            Err(e) => {
                tracing::warn!(peer_id, error = %e, "peer rejected election");
            }
        }
    }

    if accepted {
        synchronize_commits(&node).await;
        broadcast_coordinator(&node).await;

        let mut leadership = node.leadership.lock().await;
        leadership.leader_id = Some(node.config.server_id);
        node.metrics.elections_won.fetch_add(1, Ordering::Relaxed);
        tracing::info!(server_id = node.config.server_id, "elected self as leader");
    } else {
        tracing::info!("deferring to a higher-id peer, awaiting Coordinator");
    }

    node.election_in_progress.store(false, Ordering::SeqCst);
}

async fn broadcast_coordinator(node: &SharedNode) {
    let commits = match node.applier.storage().all_commits().await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "storage failure building coordinator broadcast");
            return;
        }
    };

    for (peer_id, addr) in node.config.other_peers() {
        if let Err(e) =
            node.peers.coordinator(peer_id, addr, node.config.server_id, &commits).await
        {
            tracing::debug!(peer_id, error = %e, "peer unreachable for coordinator broadcast");
        }
    }
}

/// On receiving `Election(candidate_id)`. Spawns an independent election
/// initiation (the RPC's acknowledgment is "I outrank you and will take
/// over") and returns immediately.
pub fn on_election(node: SharedNode, candidate_id: u32) -> Result<(), ProtocolError> {
    if candidate_id >= node.config.server_id {
        return Err(ProtocolError::ElectionNotLesser {
            candidate_id,
            self_id: node.config.server_id,
        });
    }
    tokio::spawn(start_election(node));
    Ok(())
}

/// On receiving `Coordinator(leader_id, commit_history)`.
pub async fn on_coordinator(
    node: &SharedNode,
    leader_id: u32,
    commit_history: Vec<Commit>,
) -> Result<(), ProtocolError> {
    if leader_id <= node.config.server_id {
        return Err(ProtocolError::CoordinatorNotGreater { leader_id, self_id: node.config.server_id });
    }

    merge_commits(node, commit_history).await;

    let mut leadership = node.leadership.lock().await;
    leadership.leader_id = Some(leader_id);
    tracing::info!(leader_id, "installed new leader from coordinator");
    Ok(())
}

/// `Synchronize Commits` (§4.4a): pull every commit after our local max from
/// each reachable peer and apply in `seq` order via the Applier's dedup.
pub async fn synchronize_commits(node: &SharedNode) {
    let local_max = match node.applier.storage().max_seq().await {
        Ok(seq) => seq,
        Err(e) => {
            tracing::error!(error = %e, "storage failure reading local max seq");
            return;
        }
    };

    for (peer_id, addr) in node.config.other_peers() {
        match node.peers.get_commits(peer_id, addr, local_max).await {
            Ok(commits) => apply_commits(node, commits).await,
            Err(e) => {
                if e.is_unreachable() {
                    node.metrics.peer_unreachable.fetch_add(1, Ordering::Relaxed);
                }
                tracing::debug!(peer_id, error = %e, "could not sync commits from peer");
            }
        }
    }
}

async fn merge_commits(node: &SharedNode, commit_history: Vec<Commit>) {
    let local_max = match node.applier.storage().max_seq().await {
        Ok(seq) => seq,
        Err(e) => {
            tracing::error!(error = %e, "storage failure reading local max seq during merge");
            return;
        }
    };
    let fresh: Vec<Commit> = commit_history.into_iter().filter(|c| c.seq > local_max).collect();
    apply_commits(node, fresh).await;
}

async fn apply_commits(node: &SharedNode, mut commits: Vec<Commit>) {
    commits.sort_by_key(|c| c.seq);
    for commit in commits {
        let request: Request = match serde_json::from_str(&commit.request_blob) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(request_id = %commit.request_id, error = %e, "unparseable commit, skipping");
                continue;
            }
        };
        match node.applier.apply_from_commit(&request).await {
            Ok(()) => {
                node.metrics.commits_applied.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(request_id = %commit.request_id, error = %e, "storage failure applying synced commit");
            }
        }
    }
}
