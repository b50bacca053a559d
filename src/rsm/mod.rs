//! Replicated state machine on top of the Paxos log.

pub mod backoff;
pub mod driver;

pub use backoff::Backoff;
pub use driver::PaxosRsm;

/// Application side of the replicated state machine.
///
/// Every peer applies the same decided values in the same order, so
/// `apply_op` must be deterministic.
pub trait StateMachine<V> {
    /// Execute a decided operation against local state
    fn apply_op(&mut self, op: &V);

    /// Whether two operations are the same request
    fn ops_equal(&self, a: &V, b: &V) -> bool;
}
