//! Collaborator traits and shared types between the stream runtime, the
//! reassembly pipeline and the business handler.
//!
//! The crate has no async runtime dependency: async trait methods return
//! boxed futures and the runtime side decides how to drive them.

mod error;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use error::{ErrorKind, StreamError};
pub use types::{
    CheckpointToken, Message, ShardContext, ShutdownReason, TransportRecord,
};

// ════════════════════════════════════════════════════════════════
//  External collaborators
// ════════════════════════════════════════════════════════════════

/// Checkpoint store handle passed by the runtime with every batch.
///
/// Errors must be categorized: `ErrorKind::Fenced` when the shard is no
/// longer owned, `ErrorKind::Config` for permanent store problems, anything
/// retriable (`Io`) for throttling and other transient failures.
pub trait Checkpointer: Send + Sync {
    /// Persist `token` as the resume position of the shard.
    fn checkpoint<'a>(
        &'a self,
        token: &'a CheckpointToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + 'a>>;
}

/// Business logic for one decoded message.
///
/// Called synchronously on the shard's processing path. A retriable error
/// makes the pipeline re-deliver the same message after a backoff.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message) -> Result<(), StreamError>;
}

// ════════════════════════════════════════════════════════════════
//  Shard processor lifecycle
// ════════════════════════════════════════════════════════════════

/// Per-shard processor driven by the stream runtime.
///
/// The runtime calls the methods strictly sequentially for one shard:
/// `initialize` once, `process_batch` for every batch in delivery order,
/// then `shutdown` once.
pub trait ShardRecordProcessor: Send {
    fn initialize(&mut self, ctx: ShardContext);

    fn process_batch<'a>(
        &'a mut self,
        records: Vec<TransportRecord>,
        checkpointer: &'a dyn Checkpointer,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    fn shutdown<'a>(
        &'a mut self,
        reason: ShutdownReason,
        checkpointer: &'a dyn Checkpointer,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Creates one processor per shard the runtime acquires.
pub trait ShardProcessorFactory: Send + Sync {
    fn create(&self) -> Box<dyn ShardRecordProcessor>;
}
