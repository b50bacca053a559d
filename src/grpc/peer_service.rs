use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::{Request, Response, Status};

use crate::error::PaxosError;
use crate::grpc::convert;
use crate::paxos::Acceptor;
use crate::proto::paxos_service_server::PaxosService;
use crate::proto::{
    AcceptRequest, AcceptResponse, LearnRequest, LearnResponse, PrepareRequest, PrepareResponse,
};

/// gRPC service exposing one peer's acceptor to the others
pub struct PeerService<V> {
    acceptor: Acceptor<V>,
}

impl<V> PeerService<V> {
    pub fn new(acceptor: Acceptor<V>) -> Self {
        Self { acceptor }
    }
}

fn to_status(err: PaxosError) -> Status {
    match err {
        PaxosError::Dead(_) => Status::unavailable(err.to_string()),
        PaxosError::Codec(_) => Status::invalid_argument(err.to_string()),
        PaxosError::GrpcError(status) => status,
        other => Status::internal(other.to_string()),
    }
}

#[tonic::async_trait]
impl<V> PaxosService for PeerService<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn prepare(
        &self,
        request: Request<PrepareRequest>,
    ) -> Result<Response<PrepareResponse>, Status> {
        let args = convert::prepare_args(request.get_ref());
        tracing::trace!(seq = args.seq, n = args.n, "Received Prepare");

        let reply = self.acceptor.prepare(args).await.map_err(to_status)?;
        let response = convert::prepare_response(&reply).map_err(to_status)?;
        Ok(Response::new(response))
    }

    async fn accept(
        &self,
        request: Request<AcceptRequest>,
    ) -> Result<Response<AcceptResponse>, Status> {
        let args = convert::accept_args::<V>(request.into_inner()).map_err(|e| {
            tracing::warn!(error = %e, "Malformed Accept request");
            to_status(e)
        })?;
        tracing::trace!(seq = args.seq, n = args.proposal.n, "Received Accept");

        let reply = self.acceptor.accept(args).await.map_err(to_status)?;
        Ok(Response::new(convert::accept_response(&reply)))
    }

    async fn learn(
        &self,
        request: Request<LearnRequest>,
    ) -> Result<Response<LearnResponse>, Status> {
        let args = convert::learn_args::<V>(request.into_inner()).map_err(|e| {
            tracing::warn!(error = %e, "Malformed Learn request");
            to_status(e)
        })?;
        tracing::trace!(
            seq = args.seq,
            n = args.proposal.n,
            from = args.sender,
            "Received Learn"
        );

        let reply = self.acceptor.learn(args).await.map_err(to_status)?;
        Ok(Response::new(convert::learn_response(&reply)))
    }
}
