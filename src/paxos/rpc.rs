use crate::paxos::state::{Fate, PaxosState, Proposal, ProposalNumber, Seq, NONE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Ok,
    Reject,
}

/// Phase 1a
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareArgs {
    pub seq: Seq,
    pub n: ProposalNumber,
}

/// Phase 1b
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReply<V> {
    pub vote: Vote,
    /// The promised number on success, the higher floor on rejection
    pub responder_n: ProposalNumber,
    /// Highest proposal accepted so far (only on success)
    pub accepted: Option<Proposal<V>>,
}

/// Phase 2a
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptArgs<V> {
    pub seq: Seq,
    pub proposal: Proposal<V>,
}

/// Phase 2b
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptReply {
    pub vote: Vote,
    pub responder_n: ProposalNumber,
}

/// Decision broadcast, piggybacking the sender's `done()` watermark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnArgs<V> {
    pub seq: Seq,
    pub proposal: Proposal<V>,
    pub sender: usize,
    pub sender_done: Seq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnReply {
    pub vote: Vote,
}

/// Handle Prepare
pub fn handle_prepare<V: Clone>(
    state: &mut PaxosState<V>,
    args: &PrepareArgs,
    me: usize,
) -> PrepareReply<V> {
    // Never recreate state for a slot that was already garbage collected
    if state.is_forgotten(args.seq) {
        tracing::trace!(peer = me, seq = args.seq, "Prepare for forgotten instance");
        return PrepareReply {
            vote: Vote::Reject,
            responder_n: NONE,
            accepted: None,
        };
    }

    state.observe(args.n);
    let instance = state.instance_mut(args.seq);

    let reply = if args.n > instance.promised {
        instance.promised = args.n;
        PrepareReply {
            vote: Vote::Ok,
            responder_n: args.n,
            accepted: instance.accepted.clone(),
        }
    } else {
        PrepareReply {
            vote: Vote::Reject,
            responder_n: instance.promised,
            accepted: None,
        }
    };

    tracing::trace!(
        peer = me,
        seq = args.seq,
        n = args.n,
        vote = ?reply.vote,
        "Prepare response"
    );

    reply
}

/// Handle Accept
pub fn handle_accept<V: Clone>(
    state: &mut PaxosState<V>,
    args: &AcceptArgs<V>,
    me: usize,
) -> AcceptReply {
    if state.is_forgotten(args.seq) {
        tracing::trace!(peer = me, seq = args.seq, "Accept for forgotten instance");
        return AcceptReply {
            vote: Vote::Reject,
            responder_n: NONE,
        };
    }

    let n = args.proposal.n;
    state.observe(n);
    let instance = state.instance_mut(args.seq);

    let reply = if n >= instance.promised {
        instance.promised = n;
        // A decided slot keeps its value; any later accept carries it anyway
        if instance.fate != Fate::Decided {
            instance.accepted = Some(args.proposal.clone());
        }
        AcceptReply {
            vote: Vote::Ok,
            responder_n: n,
        }
    } else {
        AcceptReply {
            vote: Vote::Reject,
            responder_n: instance.promised,
        }
    };

    tracing::trace!(
        peer = me,
        seq = args.seq,
        n,
        vote = ?reply.vote,
        "Accept response"
    );

    reply
}

/// Handle Learn. Always succeeds.
pub fn handle_learn<V: Clone>(
    state: &mut PaxosState<V>,
    args: &LearnArgs<V>,
    me: usize,
) -> LearnReply {
    if !state.record_done(args.sender, args.sender_done) && args.sender >= state.peer_done.len()
    {
        tracing::warn!(peer = me, sender = args.sender, "Learn from unknown peer");
    }

    if state.is_forgotten(args.seq) {
        return LearnReply { vote: Vote::Ok };
    }

    state.observe(args.proposal.n);
    let instance = state.instance_mut(args.seq);
    if instance.fate != Fate::Decided {
        instance.promised = instance.promised.max(args.proposal.n);
        instance.accepted = Some(args.proposal.clone());
        instance.fate = Fate::Decided;

        tracing::debug!(
            peer = me,
            seq = args.seq,
            n = args.proposal.n,
            from = args.sender,
            "Instance decided"
        );
    }

    LearnReply { vote: Vote::Ok }
}
