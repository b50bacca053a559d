//! Agreement tests on a healthy in-process network.
//!
//! Every decided slot must carry the same value on every peer, and that value
//! must be one some peer proposed.

mod test_harness;

use std::time::Duration;

use paxos_rsm::paxos::{Fate, NONE};
use test_harness::{assert_eventually, TestCluster};

const TIMEOUT: Duration = Duration::from_secs(5);

/// A single proposer reaches every peer
#[tokio::test]
async fn test_single_proposer() {
    let cluster = TestCluster::new(3).await;

    cluster.peer(0).start(0, "hello".to_string()).await;

    assert!(cluster.wait_decided(0, 3, TIMEOUT).await);
    for index in 0..3 {
        assert_eq!(
            cluster.decided_value(index, 0).await,
            Some("hello".to_string())
        );
    }

    cluster.shutdown().await;
}

/// Two peers race for the same slot; exactly one value wins everywhere
#[tokio::test]
async fn test_concurrent_proposers_agree() {
    let cluster = TestCluster::new(3).await;

    cluster.peer(0).start(0, "A".to_string()).await;
    cluster.peer(1).start(0, "B".to_string()).await;

    assert!(cluster.wait_decided(0, 3, TIMEOUT).await);
    let value = cluster.decided_value(2, 0).await.unwrap();
    assert!(value == "A" || value == "B", "decided unproposed value {}", value);

    cluster.shutdown().await;
}

/// Every peer proposes a different value for each of several slots
#[tokio::test]
async fn test_many_proposers_many_slots() {
    let cluster = TestCluster::new(5).await;
    let slots = 10;

    for seq in 0..slots {
        for index in 0..5 {
            cluster
                .peer(index)
                .start(seq, format!("{}-{}", seq, index))
                .await;
        }
    }

    for seq in 0..slots {
        assert!(
            cluster.wait_decided(seq, 5, TIMEOUT).await,
            "slot {} never decided everywhere",
            seq
        );
        let value = cluster.decided_value(0, seq).await.unwrap();
        assert!(value.starts_with(&format!("{}-", seq)));
    }

    cluster.shutdown().await;
}

/// Slots are independent and can be started out of order
#[tokio::test]
async fn test_out_of_order_slots() {
    let cluster = TestCluster::new(3).await;

    cluster.peer(0).start(7, "seven".to_string()).await;
    cluster.peer(1).start(2, "two".to_string()).await;
    cluster.peer(2).start(5, "five".to_string()).await;

    for (seq, value) in [(7, "seven"), (2, "two"), (5, "five")] {
        assert!(cluster.wait_decided(seq, 3, TIMEOUT).await);
        assert_eq!(cluster.decided_value(0, seq).await, Some(value.to_string()));
    }

    // Untouched slots stay pending
    assert_eq!(cluster.peer(0).status(3).await, (Fate::Pending, None));

    cluster.shutdown().await;
}

/// A late proposer for a decided slot learns the existing decision
#[tokio::test]
async fn test_late_proposer_adopts_decided_value() {
    let cluster = TestCluster::new(3).await;

    cluster.peer(0).start(0, "first".to_string()).await;
    assert!(cluster.wait_decided(0, 3, TIMEOUT).await);

    cluster.peer(2).start(0, "second".to_string()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cluster.ndecided(0).await, 3);
    assert_eq!(cluster.decided_value(1, 0).await, Some("first".to_string()));

    cluster.shutdown().await;
}

/// A peer that missed the learn broadcast still converges once it proposes
#[tokio::test]
async fn test_isolated_peer_catches_up_by_proposing() {
    let cluster = TestCluster::new(3).await;

    cluster.isolate_peer(2).await;
    cluster.peer(0).start(0, "x".to_string()).await;
    assert!(cluster.wait_decided(0, 2, TIMEOUT).await);
    assert_eq!(cluster.peer(2).status(0).await, (Fate::Pending, None));

    cluster.heal_peer(2).await;
    cluster.peer(2).start(0, "y".to_string()).await;

    assert!(cluster.wait_decided(0, 3, TIMEOUT).await);
    assert_eq!(cluster.decided_value(2, 0).await, Some("x".to_string()));

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_max_tracks_started_slots() {
    let cluster = TestCluster::new(3).await;
    assert_eq!(cluster.peer(0).max().await, NONE);

    cluster.peer(0).start(4, "a".to_string()).await;
    cluster.peer(0).start(2, "b".to_string()).await;
    assert_eq!(cluster.peer(0).max().await, 4);

    // Other peers only learned about the slots
    assert!(cluster.wait_decided(4, 3, TIMEOUT).await);
    assert_eq!(cluster.peer(1).max().await, NONE);

    cluster.shutdown().await;
}

/// Status never contacts other peers: an isolated, never-contacted peer
/// reports pending immediately
#[tokio::test]
async fn test_status_is_local() {
    let cluster = TestCluster::new(3).await;
    cluster.isolate_peer(1).await;

    cluster.peer(0).start(0, "v".to_string()).await;
    assert!(cluster.wait_decided(0, 2, TIMEOUT).await);
    // Let the proposer finish its learn broadcast
    tokio::time::sleep(Duration::from_millis(50)).await;

    let before = cluster.network.rpc_count();
    assert_eq!(cluster.peer(1).status(0).await, (Fate::Pending, None));
    assert_eq!(cluster.network.rpc_count(), before);

    cluster.shutdown().await;
}

/// Proposer tasks exit once their slot is decided
#[tokio::test]
async fn test_proposers_finish_after_decision() {
    let cluster = TestCluster::new(3).await;

    for seq in 0..5 {
        cluster.peer(0).start(seq, format!("v{}", seq)).await;
    }

    let peer = cluster.peer(0).clone();
    assert_eventually(
        || {
            let peer = peer.clone();
            async move { peer.active_proposals() == 0 }
        },
        TIMEOUT,
        "proposers should exit after their slots are decided",
    )
    .await;

    for seq in 0..5 {
        assert_eq!(cluster.ndecided(seq).await, 3);
    }

    cluster.shutdown().await;
}
