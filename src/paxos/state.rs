use std::collections::BTreeMap;

/// Position in the replicated log.
pub type Seq = i64;

/// Proposal numbers are unique per peer: `peer_index + 1 + k * peer_count`.
pub type ProposalNumber = i64;

/// Sentinel for "nothing promised/accepted/declared done yet".
pub const NONE: i64 = -1;

/// Outcome of a log slot as seen by the local peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Pending,
    Decided,
    Forgotten,
}

impl std::fmt::Display for Fate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fate::Pending => write!(f, "pending"),
            Fate::Decided => write!(f, "decided"),
            Fate::Forgotten => write!(f, "forgotten"),
        }
    }
}

/// A numbered candidate value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal<V> {
    pub n: ProposalNumber,
    pub value: V,
}

/// Acceptor-side state of a single log slot
#[derive(Debug, Clone)]
pub struct Instance<V> {
    /// Highest proposal number promised (`Np`)
    pub promised: ProposalNumber,
    /// Highest proposal accepted (`Na`, `Va`)
    pub accepted: Option<Proposal<V>>,
    pub fate: Fate,
}

impl<V> Instance<V> {
    pub fn new() -> Self {
        Self {
            promised: NONE,
            accepted: None,
            fate: Fate::Pending,
        }
    }

    pub fn accepted_n(&self) -> ProposalNumber {
        self.accepted.as_ref().map(|p| p.n).unwrap_or(NONE)
    }
}

impl<V> Default for Instance<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a peer knows about the log, guarded by one lock per peer.
///
/// # Invariants
///
/// - A `Decided` instance never changes its accepted value.
/// - `peer_done` entries only grow; stale gossip is merged with `max`.
/// - `min` only grows, and every slot below it reports `Forgotten` from then
///   on, whether or not its data has been dropped yet.
#[derive(Debug)]
pub struct PaxosState<V> {
    pub instances: BTreeMap<Seq, Instance<V>>,

    /// Highest `done()` argument heard from each peer
    pub peer_done: Vec<Seq>,

    /// Highest proposal number observed anywhere (promises, rejections, own rounds)
    pub max_seen_n: ProposalNumber,

    /// Highest sequence this peer called `start()` on
    pub max_seq: Seq,

    /// Last value returned by `min()`
    pub min: Seq,
}

impl<V: Clone> PaxosState<V> {
    pub fn new(peer_count: usize) -> Self {
        Self {
            instances: BTreeMap::new(),
            peer_done: vec![NONE; peer_count],
            max_seen_n: NONE,
            max_seq: NONE,
            min: 0,
        }
    }

    /// Get the instance for `seq`, creating a fresh one on first contact
    pub fn instance_mut(&mut self, seq: Seq) -> &mut Instance<V> {
        self.instances.entry(seq).or_default()
    }

    pub fn instance(&self, seq: Seq) -> Option<&Instance<V>> {
        self.instances.get(&seq)
    }

    /// Whether `seq` falls below the last computed minimum
    pub fn is_forgotten(&self, seq: Seq) -> bool {
        seq < self.min
    }

    pub fn observe(&mut self, n: ProposalNumber) {
        if n > self.max_seen_n {
            self.max_seen_n = n;
        }
    }

    /// Next proposal number for `me`, strictly above everything observed so far.
    pub fn next_proposal_number(&mut self, me: usize, peer_count: usize) -> ProposalNumber {
        let step = peer_count.max(1) as ProposalNumber;
        let base = me as ProposalNumber + 1;
        let n = if self.max_seen_n < base {
            base
        } else {
            base + ((self.max_seen_n - base).div_euclid(step) + 1) * step
        };
        self.max_seen_n = n;
        n
    }

    pub fn note_started(&mut self, seq: Seq) {
        if seq > self.max_seq {
            self.max_seq = seq;
        }
    }

    /// Record that `peer` no longer needs slots `<= seq`. Lower values than
    /// already known are ignored. Returns true if the table changed.
    pub fn record_done(&mut self, peer: usize, seq: Seq) -> bool {
        match self.peer_done.get_mut(peer) {
            Some(done) if seq > *done => {
                *done = seq;
                true
            }
            _ => false,
        }
    }

    /// Compute `1 + min(peer_done)`. Decided slots at or below the minimum
    /// are dropped only when it advances; nothing below it can change again.
    pub fn min(&mut self) -> Seq {
        let lowest = self.peer_done.iter().copied().min().unwrap_or(NONE);
        if lowest + 1 > self.min {
            self.min = lowest + 1;
            self.forget(lowest);
        }
        self.min
    }

    fn forget(&mut self, up_to: Seq) {
        self.instances
            .retain(|&seq, instance| seq > up_to || instance.fate != Fate::Decided);
    }

    /// Local view of a slot. Never contacts other peers.
    pub fn status(&mut self, seq: Seq) -> (Fate, Option<V>) {
        if seq < self.min() {
            return (Fate::Forgotten, None);
        }

        match self.instances.get(&seq) {
            Some(instance) if instance.fate == Fate::Decided => (
                Fate::Decided,
                instance.accepted.as_ref().map(|p| p.value.clone()),
            ),
            _ => (Fate::Pending, None),
        }
    }
}
