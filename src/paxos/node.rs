use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::paxos::acceptor::Acceptor;
use crate::paxos::quorum::Tally;
use crate::paxos::rpc::{AcceptArgs, LearnArgs, PrepareArgs, Vote};
use crate::paxos::state::{Fate, PaxosState, Proposal, ProposalNumber, Seq, NONE};
use crate::paxos::timer::random_retry_delay;
use crate::paxos::transport::PeerTransport;

const DEFAULT_RETRY_JITTER_MS: u64 = 10;

/// One peer of the replicated log.
///
/// Every peer plays proposer, acceptor and learner for every sequence number.
/// The handle is cheap to clone; clones share the same state.
pub struct Paxos<V> {
    me: usize,
    peer_count: usize,
    pub state: Arc<Mutex<PaxosState<V>>>,
    acceptor: Acceptor<V>,
    transport: Arc<dyn PeerTransport<V>>,
    dead: CancellationToken,
    tasks: TaskTracker,
    retry_jitter_ms: u64,
}

impl<V> Clone for Paxos<V> {
    fn clone(&self) -> Self {
        Self {
            me: self.me,
            peer_count: self.peer_count,
            state: self.state.clone(),
            acceptor: self.acceptor.clone(),
            transport: self.transport.clone(),
            dead: self.dead.clone(),
            tasks: self.tasks.clone(),
            retry_jitter_ms: self.retry_jitter_ms,
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Paxos<V> {
    pub fn new(me: usize, peer_count: usize, transport: Arc<dyn PeerTransport<V>>) -> Self {
        let state = Arc::new(Mutex::new(PaxosState::new(peer_count)));
        let dead = CancellationToken::new();

        Self {
            me,
            peer_count,
            acceptor: Acceptor::new(me, state.clone(), dead.clone()),
            state,
            transport,
            dead,
            tasks: TaskTracker::new(),
            retry_jitter_ms: DEFAULT_RETRY_JITTER_MS,
        }
    }

    pub fn with_retry_jitter(mut self, max_ms: u64) -> Self {
        self.retry_jitter_ms = max_ms;
        self
    }

    pub fn index(&self) -> usize {
        self.me
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// The acceptor that remote peers should reach
    pub fn acceptor(&self) -> Acceptor<V> {
        self.acceptor.clone()
    }

    /// Begin agreement on `seq` with `value` as this peer's candidate.
    ///
    /// Returns immediately; use [`Paxos::status`] to learn the outcome. The
    /// decided value may be another peer's candidate.
    pub async fn start(&self, seq: Seq, value: V) {
        if self.is_dead() {
            tracing::debug!(peer = self.me, seq, "Ignoring start on dead peer");
            return;
        }

        self.state.lock().await.note_started(seq);

        let paxos = self.clone();
        self.tasks.spawn(async move {
            paxos.propose(seq, value).await;
        });
    }

    /// Local view of `seq`; never contacts other peers
    pub async fn status(&self, seq: Seq) -> (Fate, Option<V>) {
        self.state.lock().await.status(seq)
    }

    /// The application no longer needs any instance `<= seq`
    pub async fn done(&self, seq: Seq) {
        let mut state = self.state.lock().await;
        if state.record_done(self.me, seq) {
            tracing::trace!(peer = self.me, seq, "Done watermark advanced");
        }
    }

    /// One more than the lowest `done()` value across all peers. Forgets
    /// decided instances below it.
    pub async fn min(&self) -> Seq {
        self.state.lock().await.min()
    }

    /// Highest sequence this peer has started agreement on, `-1` if none
    pub async fn max(&self) -> Seq {
        self.state.lock().await.max_seq
    }

    /// Stop all outbound activity and refuse incoming calls
    pub fn kill(&self) {
        if !self.dead.is_cancelled() {
            tracing::info!(peer = self.me, "Killing peer");
        }
        self.dead.cancel();
        self.tasks.close();
    }

    pub fn is_dead(&self) -> bool {
        self.dead.is_cancelled()
    }

    /// Kill the peer and wait for every in-flight proposer to exit
    pub async fn shutdown(&self) {
        self.kill();
        self.tasks.wait().await;
    }

    /// Number of proposer tasks still running
    pub fn active_proposals(&self) -> usize {
        self.tasks.len()
    }

    /// Proposer loop for one sequence number
    async fn propose(&self, seq: Seq, value: V) {
        loop {
            if self.is_dead() {
                return;
            }

            match self.status(seq).await.0 {
                Fate::Decided => return,
                Fate::Forgotten => {
                    tracing::debug!(peer = self.me, seq, "Abandoning forgotten instance");
                    return;
                }
                Fate::Pending => {}
            }

            let n = self
                .state
                .lock()
                .await
                .next_proposal_number(self.me, self.peer_count);

            if !self.run_round(seq, n, value.clone()).await {
                tokio::select! {
                    _ = self.dead.cancelled() => return,
                    _ = tokio::time::sleep(random_retry_delay(self.retry_jitter_ms)) => {}
                }
            }
        }
    }

    /// One prepare/accept/learn attempt. Returns true if the value was chosen.
    async fn run_round(&self, seq: Seq, n: ProposalNumber, value: V) -> bool {
        let Some(chosen) = self.prepare_phase(seq, n, value).await else {
            return false;
        };

        let proposal = Proposal { n, value: chosen };
        if !self.accept_phase(seq, &proposal).await {
            return false;
        }

        self.learn_phase(seq, proposal).await;
        true
    }

    /// Phase 1. Returns the value to propose if a majority promised.
    async fn prepare_phase(&self, seq: Seq, n: ProposalNumber, value: V) -> Option<V> {
        let args = PrepareArgs { seq, n };
        let mut calls = JoinSet::new();

        for peer in 0..self.peer_count {
            if self.is_dead() {
                return None;
            }
            let acceptor = self.acceptor.clone();
            let transport = self.transport.clone();
            let local = peer == self.me;
            calls.spawn(async move {
                let reply = if local {
                    acceptor.prepare(args).await
                } else {
                    transport.prepare(peer, args).await
                };
                (peer, reply)
            });
        }

        let mut tally = Tally::new(self.peer_count);
        while let Some(joined) = calls.join_next().await {
            let Ok((peer, reply)) = joined else {
                continue;
            };
            match reply {
                Ok(reply) if reply.vote == Vote::Ok => tally.record_ok(reply.accepted),
                Ok(reply) => tally.record_reject(reply.responder_n),
                Err(e) => tracing::trace!(peer = self.me, to = peer, seq, error = %e, "Prepare unanswered"),
            }
            if tally.is_settled() || self.is_dead() {
                break;
            }
        }
        // Dropping the set abandons the stragglers
        drop(calls);

        if let Some(floor) = tally.highest_rejection {
            self.state.lock().await.observe(floor);
        }

        tracing::debug!(
            peer = self.me,
            seq,
            n,
            promised = tally.ok,
            rejected = tally.rejected,
            "Prepare phase finished"
        );

        if !tally.is_chosen() || self.is_dead() {
            return None;
        }

        // A previously accepted value must be carried forward
        Some(tally.highest_accepted.map_or(value, |p| p.value))
    }

    /// Phase 2. Returns true if a majority accepted.
    async fn accept_phase(&self, seq: Seq, proposal: &Proposal<V>) -> bool {
        let mut calls = JoinSet::new();

        for peer in 0..self.peer_count {
            if self.is_dead() {
                return false;
            }
            let args = AcceptArgs {
                seq,
                proposal: proposal.clone(),
            };
            let acceptor = self.acceptor.clone();
            let transport = self.transport.clone();
            let local = peer == self.me;
            calls.spawn(async move {
                let reply = if local {
                    acceptor.accept(args).await
                } else {
                    transport.accept(peer, args).await
                };
                (peer, reply)
            });
        }

        let mut tally: Tally<V> = Tally::new(self.peer_count);
        while let Some(joined) = calls.join_next().await {
            let Ok((peer, reply)) = joined else {
                continue;
            };
            match reply {
                Ok(reply) if reply.vote == Vote::Ok => tally.record_ok(None),
                Ok(reply) => tally.record_reject(reply.responder_n),
                Err(e) => tracing::trace!(peer = self.me, to = peer, seq, error = %e, "Accept unanswered"),
            }
            if tally.is_settled() || self.is_dead() {
                break;
            }
        }
        drop(calls);

        if let Some(floor) = tally.highest_rejection {
            self.state.lock().await.observe(floor);
        }

        tracing::debug!(
            peer = self.me,
            seq,
            n = proposal.n,
            accepted = tally.ok,
            rejected = tally.rejected,
            "Accept phase finished"
        );

        tally.is_chosen() && !self.is_dead()
    }

    /// Phase 3. Tell everyone, gossiping our done watermark along the way.
    async fn learn_phase(&self, seq: Seq, proposal: Proposal<V>) {
        let sender_done = {
            let state = self.state.lock().await;
            state.peer_done.get(self.me).copied().unwrap_or(NONE)
        };

        let mut calls = JoinSet::new();
        for peer in 0..self.peer_count {
            if self.is_dead() {
                return;
            }
            let args = LearnArgs {
                seq,
                proposal: proposal.clone(),
                sender: self.me,
                sender_done,
            };
            let acceptor = self.acceptor.clone();
            let transport = self.transport.clone();
            let local = peer == self.me;
            calls.spawn(async move {
                let reply = if local {
                    acceptor.learn(args).await
                } else {
                    transport.learn(peer, args).await
                };
                (peer, reply)
            });
        }

        while let Some(joined) = calls.join_next().await {
            if let Ok((peer, Err(e))) = joined {
                tracing::trace!(peer = self.me, to = peer, seq, error = %e, "Learn undelivered");
            }
        }
    }
}
