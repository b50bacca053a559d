use crate::paxos::state::{Proposal, ProposalNumber};

/// Counts the votes of one Prepare or Accept round and decides when polling
/// can stop.
#[derive(Debug)]
pub struct Tally<V> {
    majority: usize,
    pub ok: usize,
    pub rejected: usize,
    /// Highest-numbered accepted proposal reported by an OK reply
    pub highest_accepted: Option<Proposal<V>>,
    /// Highest floor reported by a rejection
    pub highest_rejection: Option<ProposalNumber>,
}

impl<V> Tally<V> {
    pub fn new(peer_count: usize) -> Self {
        Self {
            majority: peer_count / 2 + 1,
            ok: 0,
            rejected: 0,
            highest_accepted: None,
            highest_rejection: None,
        }
    }

    pub fn majority(&self) -> usize {
        self.majority
    }

    pub fn record_ok(&mut self, accepted: Option<Proposal<V>>) {
        self.ok += 1;
        if let Some(proposal) = accepted {
            let higher = self
                .highest_accepted
                .as_ref()
                .map_or(true, |current| proposal.n > current.n);
            if higher {
                self.highest_accepted = Some(proposal);
            }
        }
    }

    pub fn record_reject(&mut self, responder_n: ProposalNumber) {
        self.rejected += 1;
        if self.highest_rejection.map_or(true, |n| responder_n > n) {
            self.highest_rejection = Some(responder_n);
        }
    }

    pub fn is_chosen(&self) -> bool {
        self.ok >= self.majority
    }

    /// Either side holds a strict majority
    pub fn is_settled(&self) -> bool {
        self.ok >= self.majority || self.rejected >= self.majority
    }
}
