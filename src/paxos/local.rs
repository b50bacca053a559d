//! In-process network for running many peers inside one process.
//!
//! Routes calls straight to registered acceptors and can inject the faults the
//! protocol must survive: partitioned links, dropped requests, lost replies and
//! dead peers.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;

use crate::error::{PaxosError, Result};
use crate::paxos::acceptor::Acceptor;
use crate::paxos::rpc::{AcceptArgs, AcceptReply, LearnArgs, LearnReply, PrepareArgs, PrepareReply};
use crate::paxos::transport::PeerTransport;

/// Probability that an unreliable network discards a request before delivery
const REQUEST_DROP_RATE: f64 = 0.1;
/// Probability that an unreliable network loses the reply of a delivered request
const REPLY_DROP_RATE: f64 = 0.2;

pub struct LocalNetwork<V> {
    acceptors: RwLock<HashMap<usize, Acceptor<V>>>,
    /// Directed links (from, to) that currently drop everything
    blocked: RwLock<HashSet<(usize, usize)>>,
    unreliable: AtomicBool,
    rpc_count: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> LocalNetwork<V> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            acceptors: RwLock::new(HashMap::new()),
            blocked: RwLock::new(HashSet::new()),
            unreliable: AtomicBool::new(false),
            rpc_count: AtomicU64::new(0),
        })
    }

    /// Make a peer's acceptor reachable through the network
    pub async fn register(&self, acceptor: Acceptor<V>) {
        self.acceptors
            .write()
            .await
            .insert(acceptor.index(), acceptor);
    }

    /// Transport handle used by peer `me` to reach the others
    pub fn endpoint(self: &Arc<Self>, me: usize) -> LocalTransport<V> {
        LocalTransport {
            me,
            network: self.clone(),
        }
    }

    /// Cut the link between two peers in both directions
    pub async fn disconnect(&self, a: usize, b: usize) {
        let mut blocked = self.blocked.write().await;
        blocked.insert((a, b));
        blocked.insert((b, a));
    }

    /// Restore the link between two peers
    pub async fn reconnect(&self, a: usize, b: usize) {
        let mut blocked = self.blocked.write().await;
        blocked.remove(&(a, b));
        blocked.remove(&(b, a));
    }

    pub fn set_unreliable(&self, unreliable: bool) {
        self.unreliable.store(unreliable, Ordering::SeqCst);
    }

    /// Number of calls that reached an acceptor
    pub fn rpc_count(&self) -> u64 {
        self.rpc_count.load(Ordering::SeqCst)
    }

    fn lose(&self, rate: f64) -> bool {
        self.unreliable.load(Ordering::SeqCst) && rand::thread_rng().gen_bool(rate)
    }

    async fn deliver<R, F, Fut>(&self, from: usize, to: usize, call: F) -> Result<R>
    where
        F: FnOnce(Acceptor<V>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        if self.blocked.read().await.contains(&(from, to)) {
            return Err(PaxosError::PeerUnreachable(to));
        }

        let acceptor = self
            .acceptors
            .read()
            .await
            .get(&to)
            .cloned()
            .ok_or(PaxosError::UnknownPeer(to))?;

        if acceptor.is_dead() || self.lose(REQUEST_DROP_RATE) {
            return Err(PaxosError::PeerUnreachable(to));
        }

        let reply = call(acceptor).await?;
        self.rpc_count.fetch_add(1, Ordering::SeqCst);

        if self.lose(REPLY_DROP_RATE) {
            tracing::trace!(from, to, "Reply lost");
            return Err(PaxosError::PeerUnreachable(to));
        }

        Ok(reply)
    }
}

/// One peer's view of a [`LocalNetwork`]
pub struct LocalTransport<V> {
    me: usize,
    network: Arc<LocalNetwork<V>>,
}

#[tonic::async_trait]
impl<V: Clone + Send + Sync + 'static> PeerTransport<V> for LocalTransport<V> {
    async fn prepare(&self, peer: usize, args: PrepareArgs) -> Result<PrepareReply<V>> {
        self.network
            .deliver(self.me, peer, |acceptor| async move {
                acceptor.prepare(args).await
            })
            .await
    }

    async fn accept(&self, peer: usize, args: AcceptArgs<V>) -> Result<AcceptReply> {
        self.network
            .deliver(self.me, peer, |acceptor| async move {
                acceptor.accept(args).await
            })
            .await
    }

    async fn learn(&self, peer: usize, args: LearnArgs<V>) -> Result<LearnReply> {
        self.network
            .deliver(self.me, peer, |acceptor| async move { acceptor.learn(args).await })
            .await
    }
}
