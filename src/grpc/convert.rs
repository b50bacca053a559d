//! Mapping between the protobuf messages and the engine's RPC types.
//!
//! Values travel as JSON bytes so the wire schema stays independent of the
//! application's value type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::Status;

use crate::error::{PaxosError, Result};
use crate::paxos::rpc::{
    AcceptArgs, AcceptReply, LearnArgs, LearnReply, PrepareArgs, PrepareReply, Vote,
};
use crate::paxos::Proposal;
use crate::proto;

pub fn vote_to_wire(vote: Vote) -> i32 {
    match vote {
        Vote::Ok => proto::Vote::Ok as i32,
        Vote::Reject => proto::Vote::Reject as i32,
    }
}

/// Anything but an explicit OK counts as a rejection
pub fn vote_from_wire(vote: proto::Vote) -> Vote {
    match vote {
        proto::Vote::Ok => Vote::Ok,
        proto::Vote::Reject | proto::Vote::Unspecified => Vote::Reject,
    }
}

pub fn encode_proposal<V: Serialize>(proposal: &Proposal<V>) -> Result<proto::Proposal> {
    Ok(proto::Proposal {
        n: proposal.n,
        value: serde_json::to_vec(&proposal.value)?,
    })
}

pub fn decode_proposal<V: DeserializeOwned>(proposal: proto::Proposal) -> Result<Proposal<V>> {
    Ok(Proposal {
        n: proposal.n,
        value: serde_json::from_slice(&proposal.value)?,
    })
}

fn require_proposal(proposal: Option<proto::Proposal>) -> Result<proto::Proposal> {
    proposal.ok_or_else(|| PaxosError::GrpcError(Status::invalid_argument("missing proposal")))
}

pub fn prepare_request(args: &PrepareArgs) -> proto::PrepareRequest {
    proto::PrepareRequest {
        seq: args.seq,
        n: args.n,
    }
}

pub fn prepare_args(req: &proto::PrepareRequest) -> PrepareArgs {
    PrepareArgs {
        seq: req.seq,
        n: req.n,
    }
}

pub fn prepare_response<V: Serialize>(reply: &PrepareReply<V>) -> Result<proto::PrepareResponse> {
    Ok(proto::PrepareResponse {
        vote: vote_to_wire(reply.vote),
        responder_n: reply.responder_n,
        accepted: reply.accepted.as_ref().map(encode_proposal).transpose()?,
    })
}

pub fn prepare_reply<V: DeserializeOwned>(resp: proto::PrepareResponse) -> Result<PrepareReply<V>> {
    Ok(PrepareReply {
        vote: vote_from_wire(resp.vote()),
        responder_n: resp.responder_n,
        accepted: resp.accepted.map(decode_proposal).transpose()?,
    })
}

pub fn accept_request<V: Serialize>(args: &AcceptArgs<V>) -> Result<proto::AcceptRequest> {
    Ok(proto::AcceptRequest {
        seq: args.seq,
        proposal: Some(encode_proposal(&args.proposal)?),
    })
}

pub fn accept_args<V: DeserializeOwned>(req: proto::AcceptRequest) -> Result<AcceptArgs<V>> {
    Ok(AcceptArgs {
        seq: req.seq,
        proposal: decode_proposal(require_proposal(req.proposal)?)?,
    })
}

pub fn accept_response(reply: &AcceptReply) -> proto::AcceptResponse {
    proto::AcceptResponse {
        vote: vote_to_wire(reply.vote),
        responder_n: reply.responder_n,
    }
}

pub fn accept_reply(resp: &proto::AcceptResponse) -> AcceptReply {
    AcceptReply {
        vote: vote_from_wire(resp.vote()),
        responder_n: resp.responder_n,
    }
}

pub fn learn_request<V: Serialize>(args: &LearnArgs<V>) -> Result<proto::LearnRequest> {
    Ok(proto::LearnRequest {
        seq: args.seq,
        proposal: Some(encode_proposal(&args.proposal)?),
        sender: args.sender as u64,
        sender_done: args.sender_done,
    })
}

pub fn learn_args<V: DeserializeOwned>(req: proto::LearnRequest) -> Result<LearnArgs<V>> {
    Ok(LearnArgs {
        seq: req.seq,
        proposal: decode_proposal(require_proposal(req.proposal)?)?,
        sender: usize::try_from(req.sender).unwrap_or(usize::MAX),
        sender_done: req.sender_done,
    })
}

pub fn learn_response(reply: &LearnReply) -> proto::LearnResponse {
    proto::LearnResponse {
        vote: vote_to_wire(reply.vote),
    }
}

pub fn learn_reply(resp: &proto::LearnResponse) -> LearnReply {
    LearnReply {
        vote: vote_from_wire(resp.vote()),
    }
}
