use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::NodeConfig;
use crate::error::Result;
use crate::grpc::{GrpcServer, GrpcTransport};
use crate::kv::{KvOp, KvServer};
use crate::paxos::Paxos;

/// One peer of a replicated key/value cluster talking gRPC
pub struct Node {
    pub config: NodeConfig,
    pub paxos: Paxos<KvOp>,
    pub kv: Arc<KvServer>,
}

impl Node {
    /// Build the peer. Must be called from within a tokio runtime because
    /// the peer channels are created eagerly.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let transport: Arc<GrpcTransport<KvOp>> = Arc::new(GrpcTransport::new(&config)?);
        let paxos = Paxos::new(config.peer_index, config.peer_count(), transport)
            .with_retry_jitter(config.retry_jitter_ms);
        let kv = Arc::new(KvServer::new(paxos.clone(), config.backoff.clone()));

        Ok(Self { config, paxos, kv })
    }

    /// Spawn the gRPC server. It stops when `shutdown` is cancelled.
    pub fn serve(
        &self,
        shutdown: CancellationToken,
    ) -> JoinHandle<std::result::Result<(), tonic::transport::Error>> {
        let server = GrpcServer::new(self.config.listen_addr, self.paxos.acceptor(), shutdown);
        tokio::spawn(server.run())
    }

    /// Kill the peer as soon as `shutdown` is cancelled, so callers blocked in
    /// the key/value server return `Dead` instead of waiting for a quorum.
    pub fn kill_on_shutdown(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let paxos = self.paxos.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            paxos.kill();
        })
    }

    /// Kill the peer and wait for its proposers to exit
    pub async fn shutdown(&self) {
        self.paxos.shutdown().await;
        tracing::info!(peer = self.config.peer_index, "Node stopped");
    }
}
