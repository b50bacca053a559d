use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{PaxosError, Result};
use crate::paxos::rpc::{
    handle_accept, handle_learn, handle_prepare, AcceptArgs, AcceptReply, LearnArgs, LearnReply,
    PrepareArgs, PrepareReply,
};
use crate::paxos::state::PaxosState;

/// Acceptor/learner side of a peer.
///
/// Remote calls (gRPC or in-process network) and the peer's own proposer all
/// go through these methods, so every vote takes the same lock.
pub struct Acceptor<V> {
    me: usize,
    state: Arc<Mutex<PaxosState<V>>>,
    dead: CancellationToken,
}

impl<V> Clone for Acceptor<V> {
    fn clone(&self) -> Self {
        Self {
            me: self.me,
            state: self.state.clone(),
            dead: self.dead.clone(),
        }
    }
}

impl<V: Clone + Send> Acceptor<V> {
    pub fn new(me: usize, state: Arc<Mutex<PaxosState<V>>>, dead: CancellationToken) -> Self {
        Self { me, state, dead }
    }

    pub fn index(&self) -> usize {
        self.me
    }

    pub fn is_dead(&self) -> bool {
        self.dead.is_cancelled()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_dead() {
            return Err(PaxosError::Dead(self.me));
        }
        Ok(())
    }

    pub async fn prepare(&self, args: PrepareArgs) -> Result<PrepareReply<V>> {
        self.ensure_alive()?;
        let mut state = self.state.lock().await;
        Ok(handle_prepare(&mut state, &args, self.me))
    }

    pub async fn accept(&self, args: AcceptArgs<V>) -> Result<AcceptReply> {
        self.ensure_alive()?;
        let mut state = self.state.lock().await;
        Ok(handle_accept(&mut state, &args, self.me))
    }

    pub async fn learn(&self, args: LearnArgs<V>) -> Result<LearnReply> {
        self.ensure_alive()?;
        let mut state = self.state.lock().await;
        Ok(handle_learn(&mut state, &args, self.me))
    }
}
