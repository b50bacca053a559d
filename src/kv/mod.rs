//! Replicated key/value store built on the state machine driver.

pub mod op;
pub mod server;
pub mod store;

pub use op::{KvOp, OpKind};
pub use server::KvServer;
pub use store::KvStore;
