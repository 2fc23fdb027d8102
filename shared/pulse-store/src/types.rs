//! Batch operations for pipelined execution

use std::time::Duration;

/// One deferred write. Every variant (re)applies its TTL in the same step.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    IncrWithExpiry {
        key: String,
        ttl: Duration,
    },
    SAddWithExpiry {
        key: String,
        member: String,
        ttl: Duration,
    },
    ZAddWithExpiry {
        key: String,
        score: f64,
        member: String,
        ttl: Duration,
    },
}

impl BatchOp {
    pub fn key(&self) -> &str {
        match self {
            Self::IncrWithExpiry { key, .. }
            | Self::SAddWithExpiry { key, .. }
            | Self::ZAddWithExpiry { key, .. } => key,
        }
    }
}

/// Result of one applied `BatchOp`, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchReply {
    /// New counter value after an increment.
    Integer(i64),
    /// Whether a set or sorted-set member was newly added.
    Added(bool),
}

/// Group of writes issued together in one round trip.
///
/// Execution is not all-or-nothing: a failure part way through leaves the
/// earlier operations applied.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_with_expiry(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.ops.push(BatchOp::IncrWithExpiry {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn sadd_with_expiry(
        &mut self,
        key: impl Into<String>,
        member: impl Into<String>,
        ttl: Duration,
    ) -> &mut Self {
        self.ops.push(BatchOp::SAddWithExpiry {
            key: key.into(),
            member: member.into(),
            ttl,
        });
        self
    }

    pub fn zadd_with_expiry(
        &mut self,
        key: impl Into<String>,
        score: f64,
        member: impl Into<String>,
        ttl: Duration,
    ) -> &mut Self {
        self.ops.push(BatchOp::ZAddWithExpiry {
            key: key.into(),
            score,
            member: member.into(),
            ttl,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
