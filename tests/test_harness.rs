//! Test harness for multi-peer Paxos integration tests.
//!
//! Runs every peer in-process on a `LocalNetwork`, which can partition links,
//! drop messages and route around killed peers.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use paxos_rsm::paxos::{Fate, LocalNetwork, Paxos, Seq};

/// Cluster of in-process peers agreeing on `String` values
pub struct TestCluster {
    pub peers: Vec<Paxos<String>>,
    pub network: Arc<LocalNetwork<String>>,
}

impl TestCluster {
    /// Create a cluster with `n` connected peers
    pub async fn new(n: usize) -> Self {
        let network: Arc<LocalNetwork<String>> = LocalNetwork::new();
        let mut peers = Vec::with_capacity(n);

        for me in 0..n {
            let transport = Arc::new(network.endpoint(me));
            let paxos = Paxos::new(me, n, transport).with_retry_jitter(5);
            network.register(paxos.acceptor()).await;
            peers.push(paxos);
        }

        Self { peers, network }
    }

    pub fn peer(&self, index: usize) -> &Paxos<String> {
        &self.peers[index]
    }

    /// Number of peers that have decided `seq`. Panics if two peers decided
    /// different values.
    pub async fn ndecided(&self, seq: Seq) -> usize {
        let mut count = 0;
        let mut agreed: Option<(usize, String)> = None;

        for (index, peer) in self.peers.iter().enumerate() {
            if let (Fate::Decided, Some(value)) = peer.status(seq).await {
                if let Some((first, ref expected)) = agreed {
                    assert_eq!(
                        &value, expected,
                        "peers {} and {} decided different values for seq {}",
                        first, index, seq
                    );
                } else {
                    agreed = Some((index, value));
                }
                count += 1;
            }
        }

        count
    }

    /// Wait until at least `wanted` peers have decided `seq`
    pub async fn wait_decided(&self, seq: Seq, wanted: usize, timeout_duration: Duration) -> bool {
        wait_for(
            || async { self.ndecided(seq).await >= wanted },
            timeout_duration,
            Duration::from_millis(10),
        )
        .await
    }

    /// Wait until a majority has decided `seq`
    pub async fn wait_majority(&self, seq: Seq, timeout_duration: Duration) -> bool {
        self.wait_decided(seq, self.peers.len() / 2 + 1, timeout_duration)
            .await
    }

    /// Value decided for `seq` at `index`, if any
    pub async fn decided_value(&self, index: usize, seq: Seq) -> Option<String> {
        match self.peers[index].status(seq).await {
            (Fate::Decided, value) => value,
            _ => None,
        }
    }

    /// Kill a peer (simulates a crash)
    pub fn kill(&self, index: usize) {
        self.peers[index].kill();
    }

    /// Create a network partition: group_a can't reach group_b and vice versa
    pub async fn create_partition(&self, group_a: &[usize], group_b: &[usize]) {
        for &a in group_a {
            for &b in group_b {
                self.network.disconnect(a, b).await;
            }
        }
    }

    /// Restore communication between two groups
    pub async fn heal_partition(&self, group_a: &[usize], group_b: &[usize]) {
        for &a in group_a {
            for &b in group_b {
                self.network.reconnect(a, b).await;
            }
        }
    }

    /// Isolate a peer from all other peers
    pub async fn isolate_peer(&self, index: usize) {
        let others = self.others(index);
        self.create_partition(&[index], &others).await;
    }

    pub async fn heal_peer(&self, index: usize) {
        let others = self.others(index);
        self.heal_partition(&[index], &others).await;
    }

    fn others(&self, index: usize) -> Vec<usize> {
        (0..self.peers.len()).filter(|&i| i != index).collect()
    }

    pub fn set_unreliable(&self, unreliable: bool) {
        self.network.set_unreliable(unreliable);
    }

    /// Kill every peer and wait for their proposers to exit
    pub async fn shutdown(&self) {
        for peer in &self.peers {
            peer.shutdown().await;
        }
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        // Stop background proposers that outlive the test body
        for peer in &self.peers {
            peer.kill();
        }
    }
}

/// Wait for a condition to become true with timeout
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout_duration {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

/// Assert a condition eventually becomes true
pub async fn assert_eventually<F, Fut>(condition: F, timeout_duration: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout_duration, Duration::from_millis(20)).await;
    assert!(result, "{}", message);
}
