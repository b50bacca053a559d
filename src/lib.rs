pub mod config;
pub mod error;
pub mod grpc;
pub mod kv;
pub mod node;
pub mod paxos;
pub mod rsm;
pub mod shutdown;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("paxos");
}
