use tokio::sync::Mutex;

use crate::config::BackoffConfig;
use crate::error::Result;
use crate::kv::op::KvOp;
use crate::kv::store::KvStore;
use crate::paxos::{Paxos, Seq};
use crate::rsm::PaxosRsm;

/// Key/value service replicated through the Paxos log.
///
/// Requests on one server are serialized; concurrency comes from running
/// several servers against the same peer set.
pub struct KvServer {
    rsm: Mutex<PaxosRsm<KvOp, KvStore>>,
}

impl KvServer {
    pub fn new(paxos: Paxos<KvOp>, backoff: BackoffConfig) -> Self {
        Self {
            rsm: Mutex::new(PaxosRsm::new(paxos, KvStore::new()).with_backoff(backoff)),
        }
    }

    /// Read `key` after every write decided before this call
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rsm = self.rsm.lock().await;
        rsm.add_op(KvOp::get(key)).await?;
        Ok(rsm.state_machine().get(key).map(str::to_string))
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.submit(KvOp::put(key, value)).await
    }

    pub async fn append(&self, key: &str, value: &str) -> Result<()> {
        self.submit(KvOp::append(key, value)).await
    }

    /// Submit a prepared request. Retrying with an already applied id is a
    /// no-op.
    pub async fn submit(&self, op: KvOp) -> Result<()> {
        let mut rsm = self.rsm.lock().await;
        if rsm.state_machine().is_applied(&op.id) {
            return Ok(());
        }
        let seq = rsm.add_op(op).await?;
        tracing::debug!(seq, "Request committed");
        Ok(())
    }

    /// Next log slot this server will use
    pub async fn cursor(&self) -> Seq {
        self.rsm.lock().await.cursor()
    }
}
