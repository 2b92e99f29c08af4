use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Checkpoint Token
// ════════════════════════════════════════════════════════════════

/// Opaque position marker of a transport record.
///
/// Only the checkpoint store interprets it (a sequence number, a file
/// index, ...). The pipeline just carries it from the record that completed
/// a chain to `Checkpointer::checkpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointToken(String);

impl CheckpointToken {
    pub fn new(position: impl Into<String>) -> Self {
        Self(position.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckpointToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for CheckpointToken {
    fn from(seq: u64) -> Self {
        Self(seq.to_string())
    }
}

// ════════════════════════════════════════════════════════════════
//  Transport Record
// ════════════════════════════════════════════════════════════════

/// One record as delivered by the stream runtime: opaque bytes plus the
/// position token the runtime would accept back as a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRecord {
    pub data: Vec<u8>,
    pub position: CheckpointToken,
}

impl TransportRecord {
    pub fn new(data: Vec<u8>, position: impl Into<CheckpointToken>) -> Self {
        Self { data, position: position.into() }
    }
}

impl From<&str> for CheckpointToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CheckpointToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ════════════════════════════════════════════════════════════════
//  Message
// ════════════════════════════════════════════════════════════════

/// A fully reassembled and decoded application message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Source partition from the chunk header.
    pub partition: i32,
    /// Source offset from the chunk header (identifies the message).
    pub offset: i64,
    pub document: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════
//  Shard lifecycle
// ════════════════════════════════════════════════════════════════

/// Handed to a processor once, before the first batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardContext {
    pub shard_id: String,
}

/// Why the runtime is releasing a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// Shard ended or is handed over cleanly. A final checkpoint is expected.
    GracefulHandoff,
    /// Lease lost to another worker. Checkpoints would be rejected.
    OwnershipLost,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::GracefulHandoff => f.write_str("graceful_handoff"),
            ShutdownReason::OwnershipLost => f.write_str("ownership_lost"),
        }
    }
}
