use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tonic::transport::{Channel, Endpoint};

use crate::config::NodeConfig;
use crate::error::{PaxosError, Result};
use crate::grpc::convert;
use crate::paxos::rpc::{AcceptArgs, AcceptReply, LearnArgs, LearnReply, PrepareArgs, PrepareReply};
use crate::paxos::PeerTransport;
use crate::proto::paxos_service_client::PaxosServiceClient;

/// Reaches the other peers over gRPC.
///
/// Channels connect lazily and reconnect on their own, so a peer that is down
/// at startup simply fails calls until it comes up.
pub struct GrpcTransport<V> {
    peers: HashMap<usize, PaxosServiceClient<Channel>>,
    rpc_timeout: Duration,
    _value: PhantomData<fn() -> V>,
}

impl<V> GrpcTransport<V> {
    /// Must be called from within a tokio runtime
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let mut peers = HashMap::new();
        for peer in &config.peers {
            if peer.index == config.peer_index {
                continue;
            }
            let endpoint = Endpoint::from_shared(format!("http://{}", peer.addr))?
                .connect_timeout(config.rpc_timeout());
            peers.insert(peer.index, PaxosServiceClient::new(endpoint.connect_lazy()));
        }

        Ok(Self {
            peers,
            rpc_timeout: config.rpc_timeout(),
            _value: PhantomData,
        })
    }

    fn client(&self, peer: usize) -> Result<PaxosServiceClient<Channel>> {
        self.peers
            .get(&peer)
            .cloned()
            .ok_or(PaxosError::UnknownPeer(peer))
    }

    /// Run one call under the per-call deadline
    async fn call<T, Fut>(&self, peer: usize, rpc: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
    {
        match timeout(self.rpc_timeout, rpc).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => {
                tracing::trace!(to = peer, code = ?status.code(), "Call failed");
                Err(PaxosError::GrpcError(status))
            }
            Err(_) => {
                tracing::trace!(to = peer, "Call timed out");
                Err(PaxosError::PeerUnreachable(peer))
            }
        }
    }
}

#[tonic::async_trait]
impl<V> PeerTransport<V> for GrpcTransport<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn prepare(&self, peer: usize, args: PrepareArgs) -> Result<PrepareReply<V>> {
        let mut client = self.client(peer)?;
        let request = convert::prepare_request(&args);
        let response = self.call(peer, client.prepare(request)).await?;
        convert::prepare_reply(response).map_err(|e| {
            tracing::warn!(from = peer, error = %e, "Undecodable Prepare reply");
            e
        })
    }

    async fn accept(&self, peer: usize, args: AcceptArgs<V>) -> Result<AcceptReply> {
        let mut client = self.client(peer)?;
        let request = convert::accept_request(&args)?;
        let response = self.call(peer, client.accept(request)).await?;
        Ok(convert::accept_reply(&response))
    }

    async fn learn(&self, peer: usize, args: LearnArgs<V>) -> Result<LearnReply> {
        let mut client = self.client(peer)?;
        let request = convert::learn_request(&args)?;
        let response = self.call(peer, client.learn(request)).await?;
        Ok(convert::learn_reply(&response))
    }
}
