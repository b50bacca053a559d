//! Replicated state machine tests.
//!
//! Every peer must apply the same operations in the same order, and add_op
//! must only return once the caller's own operation is in the log.

use std::sync::Arc;
use std::time::Duration;

use paxos_rsm::config::BackoffConfig;
use paxos_rsm::error::PaxosError;
use paxos_rsm::kv::{KvOp, KvServer};
use paxos_rsm::paxos::{LocalNetwork, Paxos};
use paxos_rsm::rsm::{PaxosRsm, StateMachine};
use tokio::sync::Mutex;

/// Records every applied operation in order
#[derive(Debug, Default)]
struct Recorder {
    applied: Vec<String>,
}

impl StateMachine<String> for Recorder {
    fn apply_op(&mut self, op: &String) {
        self.applied.push(op.clone());
    }

    fn ops_equal(&self, a: &String, b: &String) -> bool {
        a == b
    }
}

fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        initial_ms: 1,
        max_ms: 50,
    }
}

async fn paxos_peers<V>(n: usize) -> Vec<Paxos<V>>
where
    V: Clone + Send + Sync + 'static,
{
    let network: Arc<LocalNetwork<V>> = LocalNetwork::new();
    let mut peers = Vec::with_capacity(n);
    for me in 0..n {
        let paxos = Paxos::new(me, n, Arc::new(network.endpoint(me))).with_retry_jitter(5);
        network.register(paxos.acceptor()).await;
        peers.push(paxos);
    }
    peers
}

fn recorders(peers: Vec<Paxos<String>>) -> Vec<Arc<Mutex<PaxosRsm<String, Recorder>>>> {
    peers
        .into_iter()
        .map(|paxos| {
            Arc::new(Mutex::new(
                PaxosRsm::new(paxos, Recorder::default()).with_backoff(fast_backoff()),
            ))
        })
        .collect()
}

#[tokio::test]
async fn test_add_op_single_peer_sequence() {
    let rsms = recorders(paxos_peers(3).await);

    let mut rsm = rsms[0].lock().await;
    assert_eq!(rsm.add_op("a".to_string()).await.unwrap(), 0);
    assert_eq!(rsm.add_op("b".to_string()).await.unwrap(), 1);
    assert_eq!(rsm.add_op("c".to_string()).await.unwrap(), 2);

    assert_eq!(rsm.state_machine().applied, vec!["a", "b", "c"]);
    assert_eq!(rsm.cursor(), 3);
}

/// Two peers race for slot 0: both return, one of them after also applying
/// the other's op
#[tokio::test]
async fn test_racing_add_op() {
    let rsms = recorders(paxos_peers(3).await);

    let first = rsms[0].clone();
    let second = rsms[1].clone();
    let a = tokio::spawn(async move { first.lock().await.add_op("A".to_string()).await });
    let b = tokio::spawn(async move { second.lock().await.add_op("B".to_string()).await });

    let seq_a = tokio::time::timeout(Duration::from_secs(10), a)
        .await
        .expect("add_op A timed out")
        .unwrap()
        .unwrap();
    let seq_b = tokio::time::timeout(Duration::from_secs(10), b)
        .await
        .expect("add_op B timed out")
        .unwrap()
        .unwrap();

    assert_ne!(seq_a, seq_b);
    assert_eq!(seq_a.min(seq_b), 0);

    // The loser applied the winner's op first
    let winner_op = if seq_a == 0 { "A" } else { "B" };
    let loser = if seq_a == 0 { &rsms[1] } else { &rsms[0] };
    let applied = loser.lock().await.state_machine().applied.clone();
    assert_eq!(applied[0], winner_op);
    assert_eq!(applied.len(), 2);
}

/// Peers that catch up apply exactly the same sequence
#[tokio::test]
async fn test_identical_apply_order() {
    let rsms = recorders(paxos_peers(3).await);

    let mut handles = Vec::new();
    for (index, rsm) in rsms.iter().enumerate() {
        let rsm = rsm.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..5 {
                rsm.lock()
                    .await
                    .add_op(format!("{}-{}", index, i))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(20), handle)
            .await
            .expect("workload timed out")
            .unwrap();
    }

    // Bring everyone to the same cursor with one more op each
    for (index, rsm) in rsms.iter().enumerate() {
        rsm.lock()
            .await
            .add_op(format!("sync-{}", index))
            .await
            .unwrap();
    }

    let longest = rsms[2].lock().await.state_machine().applied.clone();
    assert!(longest.len() >= 18);
    for rsm in &rsms[..2] {
        let applied = rsm.lock().await.state_machine().applied.clone();
        assert_eq!(&applied[..], &longest[..applied.len()]);
    }

    // Each of the 15 workload ops appears exactly once
    for index in 0..3 {
        for i in 0..5 {
            let op = format!("{}-{}", index, i);
            assert_eq!(longest.iter().filter(|v| **v == op).count(), 1);
        }
    }
}

#[tokio::test]
async fn test_add_op_fails_on_dead_peer() {
    let peers = paxos_peers::<String>(3).await;
    peers[1].kill();
    peers[2].kill();

    let paxos = peers[0].clone();
    let mut rsm = PaxosRsm::new(paxos.clone(), Recorder::default()).with_backoff(fast_backoff());

    let killer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        paxos.kill();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), rsm.add_op("x".to_string()))
        .await
        .expect("add_op should notice the dead peer");
    assert!(matches!(result, Err(PaxosError::Dead(0))));
    assert!(rsm.state_machine().applied.is_empty());

    killer.await.unwrap();
}

#[tokio::test]
async fn test_kv_servers_share_state() {
    let servers: Vec<KvServer> = paxos_peers::<KvOp>(3)
        .await
        .into_iter()
        .map(|paxos| KvServer::new(paxos, fast_backoff()))
        .collect();

    servers[0].put("a", "x").await.unwrap();
    servers[1].append("a", "y").await.unwrap();
    servers[2].append("a", "z").await.unwrap();

    for server in &servers {
        assert_eq!(server.get("a").await.unwrap(), Some("xyz".to_string()));
    }
    assert_eq!(servers[1].get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_kv_duplicate_request_applied_once() {
    let servers: Vec<KvServer> = paxos_peers::<KvOp>(3)
        .await
        .into_iter()
        .map(|paxos| KvServer::new(paxos, fast_backoff()))
        .collect();

    let op = KvOp::append("k", "1");
    servers[0].submit(op.clone()).await.unwrap();
    // A retry reaching another server finds the request already in the log
    servers[1].submit(op.clone()).await.unwrap();
    servers[0].submit(op).await.unwrap();

    for server in &servers {
        assert_eq!(server.get("k").await.unwrap(), Some("1".to_string()));
    }
}
