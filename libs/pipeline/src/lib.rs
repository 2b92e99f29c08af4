//! Per-shard processing pipeline: reassembly, decoding, delivery to the
//! business handler, bounded retries and periodic checkpointing.
//!
//! The stream runtime drives one [`ShardProcessor`] per shard through the
//! [`stream_api::ShardRecordProcessor`] lifecycle. Records are processed
//! strictly in order; the resume position committed to the
//! [`stream_api::Checkpointer`] is always the record that completed the most
//! recent chain.

pub mod checkpoint;
pub mod config;
pub mod decode;
pub mod error;
mod processor;
pub mod retry;

pub use checkpoint::{CheckpointScheduler, CommitOutcome};
pub use config::{CheckpointConfig, ProcessorConfig, RetryConfig};
pub use decode::{DecodeError, decode_message};
pub use error::PipelineError;
pub use processor::{BatchSummary, ProcessorFactory, ShardProcessor};
pub use retry::{Retriable, RetryOutcome, RetryPolicy};
