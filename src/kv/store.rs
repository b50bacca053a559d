use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::kv::op::{KvOp, OpKind};
use crate::rsm::StateMachine;

/// In-memory key/value state rebuilt from the log
#[derive(Debug, Default)]
pub struct KvStore {
    data: HashMap<String, String>,
    applied: HashSet<Uuid>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn is_applied(&self, id: &Uuid) -> bool {
        self.applied.contains(id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl StateMachine<KvOp> for KvStore {
    fn apply_op(&mut self, op: &KvOp) {
        // The same request can be decided in more than one slot
        if !self.applied.insert(op.id) {
            tracing::trace!(id = %op.id, "Skipping duplicate request");
            return;
        }

        match op.kind {
            OpKind::Get => {}
            OpKind::Put => {
                self.data.insert(op.key.clone(), op.value.clone());
            }
            OpKind::Append => {
                self.data
                    .entry(op.key.clone())
                    .or_default()
                    .push_str(&op.value);
            }
        }
    }

    fn ops_equal(&self, a: &KvOp, b: &KvOp) -> bool {
        a.id == b.id
    }
}
