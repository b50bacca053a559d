pub mod acceptor;
pub mod local;
pub mod node;
pub mod quorum;
pub mod rpc;
pub mod state;
pub mod timer;
pub mod transport;

pub use acceptor::Acceptor;
pub use local::{LocalNetwork, LocalTransport};
pub use node::Paxos;
pub use state::{Fate, Proposal, ProposalNumber, Seq, NONE};
pub use transport::PeerTransport;
