use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{PaxosError, Result};

/// Exponential backoff used by the replicated state machine while it waits
/// for an instance to be decided.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// First poll delay
    pub initial_ms: u64,
    /// Upper bound on the delay between polls
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 10,
            max_ms: 10_000,
        }
    }
}

impl BackoffConfig {
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Index of this peer within `peers`
    pub peer_index: usize,
    pub listen_addr: SocketAddr,
    /// The full, fixed peer set including this node
    pub peers: Vec<PeerConfig>,
    /// Deadline for a single Prepare/Accept/Learn call to another peer
    pub rpc_timeout_ms: u64,
    /// Upper bound of the random pause between failed proposer rounds
    pub retry_jitter_ms: u64,
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub index: usize,
    pub addr: String, // host:port format, supports both IP and hostnames
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_index: 0,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            peers: Vec::new(),
            rpc_timeout_ms: 500,
            retry_jitter_ms: 10,
            backoff: BackoffConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn new(peer_index: usize, listen_addr: SocketAddr) -> Self {
        Self {
            peer_index,
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_peer(mut self, index: usize, addr: String) -> Self {
        self.peers.push(PeerConfig { index, addr });
        self
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Check that peer indices are exactly `0..N` and include this node.
    pub fn validate(&self) -> Result<()> {
        if self.peers.is_empty() {
            return Err(PaxosError::InvalidConfig("peer set is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if peer.index >= self.peers.len() {
                return Err(PaxosError::InvalidConfig(format!(
                    "peer index {} out of range for {} peers",
                    peer.index,
                    self.peers.len()
                )));
            }
            if !seen.insert(peer.index) {
                return Err(PaxosError::InvalidConfig(format!(
                    "duplicate peer index {}",
                    peer.index
                )));
            }
        }

        if self.peer_index >= self.peers.len() {
            return Err(PaxosError::InvalidConfig(format!(
                "own index {} is not in the peer set",
                self.peer_index
            )));
        }

        Ok(())
    }
}
