use thiserror::Error;

use crate::paxos::Seq;

#[derive(Error, Debug)]
pub enum PaxosError {
    #[error("Peer {0} is unreachable")]
    PeerUnreachable(usize),

    #[error("Unknown peer index {0}")]
    UnknownPeer(usize),

    #[error("Peer {0} is dead")]
    Dead(usize),

    #[error("Instance {0} has been forgotten")]
    Forgotten(Seq),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("gRPC error: {0}")]
    GrpcError(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PaxosError>;
