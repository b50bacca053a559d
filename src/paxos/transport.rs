use crate::error::Result;
use crate::paxos::rpc::{AcceptArgs, AcceptReply, LearnArgs, LearnReply, PrepareArgs, PrepareReply};

/// Point-to-point calls from a proposer to another peer's acceptor.
///
/// A call may fail outright or never be answered; the proposer treats both as
/// a missing vote. Calls to the local peer never go through a transport.
#[tonic::async_trait]
pub trait PeerTransport<V>: Send + Sync + 'static
where
    V: Send + Sync + 'static,
{
    async fn prepare(&self, peer: usize, args: PrepareArgs) -> Result<PrepareReply<V>>;

    async fn accept(&self, peer: usize, args: AcceptArgs<V>) -> Result<AcceptReply>;

    async fn learn(&self, peer: usize, args: LearnArgs<V>) -> Result<LearnReply>;
}
