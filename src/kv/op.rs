use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Get,
    Put,
    Append,
}

/// One client request, as agreed upon through the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvOp {
    /// Unique per request; retries of the same request reuse it
    pub id: Uuid,
    pub kind: OpKind,
    pub key: String,
    pub value: String,
}

impl KvOp {
    pub fn get(key: impl Into<String>) -> Self {
        Self::new(OpKind::Get, key.into(), String::new())
    }

    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(OpKind::Put, key.into(), value.into())
    }

    pub fn append(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(OpKind::Append, key.into(), value.into())
    }

    fn new(kind: OpKind, key: String, value: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            key,
            value,
        }
    }
}
