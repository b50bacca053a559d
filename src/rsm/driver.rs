use crate::config::BackoffConfig;
use crate::error::{PaxosError, Result};
use crate::paxos::{Fate, Paxos, Seq};
use crate::rsm::{Backoff, StateMachine};

/// Drives application operations into consecutive log slots.
///
/// Owns the local cursor: every slot below it has been applied to the state
/// machine exactly once, in order, and declared done to the engine.
pub struct PaxosRsm<V, S> {
    paxos: Paxos<V>,
    state_machine: S,
    cursor: Seq,
    backoff: BackoffConfig,
}

impl<V, S> PaxosRsm<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: StateMachine<V>,
{
    pub fn new(paxos: Paxos<V>, state_machine: S) -> Self {
        Self {
            paxos,
            state_machine,
            cursor: 0,
            backoff: BackoffConfig::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Append `op` to the replicated log.
    ///
    /// Returns once `op` has been decided and applied, with the slot it landed
    /// in. Every value decided before it is applied first, which may include
    /// operations from other peers.
    ///
    /// Contention and unreachable peers are retried indefinitely. Two cases
    /// end the call with an error instead: the local peer is killed while
    /// waiting (`PaxosError::Dead`), and the cursor's slot has already been
    /// forgotten (`PaxosError::Forgotten`). A killed peer would otherwise
    /// report its slot as pending forever.
    pub async fn add_op(&mut self, op: V) -> Result<Seq> {
        loop {
            let seq = self.cursor;
            let decided = match self.paxos.status(seq).await {
                (Fate::Decided, Some(value)) => value,
                (Fate::Forgotten, _) => return Err(PaxosError::Forgotten(seq)),
                _ => {
                    self.paxos.start(seq, op.clone()).await;
                    self.wait_decided(seq).await?
                }
            };

            self.state_machine.apply_op(&decided);
            self.paxos.done(seq).await;
            self.cursor += 1;

            if self.state_machine.ops_equal(&op, &decided) {
                tracing::debug!(peer = self.paxos.index(), seq, "Operation applied");
                return Ok(seq);
            }

            tracing::debug!(
                peer = self.paxos.index(),
                seq,
                "Slot taken by another operation, moving on"
            );
        }
    }

    /// Poll the local engine until `seq` is decided
    async fn wait_decided(&self, seq: Seq) -> Result<V> {
        let mut backoff = Backoff::new(&self.backoff);
        loop {
            match self.paxos.status(seq).await {
                (Fate::Decided, Some(value)) => return Ok(value),
                (Fate::Forgotten, _) => return Err(PaxosError::Forgotten(seq)),
                _ => {}
            }
            if self.paxos.is_dead() {
                return Err(PaxosError::Dead(self.paxos.index()));
            }
            tokio::time::sleep(backoff.next_delay()).await;
        }
    }

    pub fn state_machine(&self) -> &S {
        &self.state_machine
    }

    /// Next slot this driver will try
    pub fn cursor(&self) -> Seq {
        self.cursor
    }

    pub fn paxos(&self) -> &Paxos<V> {
        &self.paxos
    }
}
