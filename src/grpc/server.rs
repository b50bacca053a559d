use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::grpc::peer_service::PeerService;
use crate::paxos::Acceptor;
use crate::proto::paxos_service_server::PaxosServiceServer;

pub struct GrpcServer<V> {
    addr: SocketAddr,
    acceptor: Acceptor<V>,
    shutdown: CancellationToken,
}

impl<V> GrpcServer<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(addr: SocketAddr, acceptor: Acceptor<V>, shutdown: CancellationToken) -> Self {
        Self {
            addr,
            acceptor,
            shutdown,
        }
    }

    /// Serve until the shutdown token is cancelled
    pub async fn run(self) -> Result<(), tonic::transport::Error> {
        let peer_service = PeerService::new(self.acceptor);
        let shutdown = self.shutdown;

        tracing::info!(addr = %self.addr, "Starting gRPC server");

        Server::builder()
            .add_service(PaxosServiceServer::new(peer_service))
            .serve_with_shutdown(self.addr, async move { shutdown.cancelled().await })
            .await
    }
}
