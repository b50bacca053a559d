pub mod client;
pub mod convert;
pub mod peer_service;
pub mod server;

pub use client::GrpcTransport;
pub use peer_service::PeerService;
pub use server::GrpcServer;
