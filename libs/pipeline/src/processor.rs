use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use reassembly::{Discard, Outcome, Reassembler};
use stream_api::{
    Checkpointer, Message, MessageHandler, ShardContext, ShardProcessorFactory,
    ShardRecordProcessor, ShutdownReason, StreamError, TransportRecord,
};

use crate::PipelineError;
use crate::checkpoint::{CheckpointScheduler, CommitOutcome};
use crate::config::ProcessorConfig;
use crate::decode::decode_message;
use crate::retry::{RetryOutcome, RetryPolicy};

// ═══════════════════════════════════════════════════════════════
//  Batch results
// ═══════════════════════════════════════════════════════════════

/// What happened to one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub records: usize,
    /// Messages accepted by the handler.
    pub delivered: usize,
    /// Records discarded by reassembly or with an undecodable payload.
    pub dropped: usize,
    /// Records given up on after the handler kept failing.
    pub skipped: usize,
    /// The ownership token fired before the batch finished.
    pub interrupted: bool,
    pub checkpoint: Option<CommitOutcome>,
}

/// Result of one successful pass over a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Chunk buffered, chain not complete yet.
    Pending,
    Dropped,
    Delivered,
}

enum Assembly {
    Incomplete,
    Dropped,
    Complete(Message),
}

// ═══════════════════════════════════════════════════════════════
//  ShardProcessor
// ═══════════════════════════════════════════════════════════════

/// Reassembles, decodes and delivers the records of one shard, and
/// checkpoints the position of the last completed message.
pub struct ShardProcessor {
    shard_id: String,
    reassembler: Reassembler,
    handler: Arc<dyn MessageHandler>,
    processing: RetryPolicy,
    scheduler: CheckpointScheduler,
    ownership: CancellationToken,
    /// Assembled message whose delivery failed; retried without re-ingesting.
    undelivered: Option<Message>,
}

impl ShardProcessor {
    pub fn new(config: &ProcessorConfig, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            shard_id: String::from("unassigned"),
            reassembler: Reassembler::new(),
            handler,
            processing: config.processing.policy(),
            scheduler: CheckpointScheduler::new(&config.checkpoint),
            ownership: CancellationToken::new(),
            undelivered: None,
        }
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// Token cancelled when the shard is no longer owned. The runtime may
    /// cancel a clone of it at any time to stop in-flight retries.
    pub fn ownership_token(&self) -> CancellationToken {
        self.ownership.clone()
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn scheduler(&self) -> &CheckpointScheduler {
        &self.scheduler
    }

    /// Process `records` in order, then checkpoint if the interval elapsed.
    pub async fn process_records(
        &mut self,
        records: Vec<TransportRecord>,
        checkpointer: &dyn Checkpointer,
    ) -> BatchSummary {
        tracing::info!(shard = %self.shard_id, records = records.len(), "processing records");

        let mut summary = BatchSummary {
            records: records.len(),
            ..BatchSummary::default()
        };
        let policy = self.processing;
        let cancel = self.ownership.clone();

        for record in &records {
            let outcome = policy
                .execute(&cancel, "process record", |_| {
                    std::future::ready(self.process_record(record))
                })
                .await;
            self.undelivered = None;

            match outcome {
                RetryOutcome::Success(Delivery::Pending) => {}
                RetryOutcome::Success(Delivery::Dropped) => summary.dropped += 1,
                RetryOutcome::Success(Delivery::Delivered) => summary.delivered += 1,
                RetryOutcome::ExhaustedRetries { attempts, last_error } => {
                    tracing::error!(
                        shard = %self.shard_id,
                        position = %record.position,
                        attempts,
                        error = %last_error,
                        "skipping record after retries"
                    );
                    summary.skipped += 1;
                }
                RetryOutcome::Abandoned(e) => {
                    tracing::error!(
                        shard = %self.shard_id,
                        position = %record.position,
                        error = %e,
                        "skipping record, error is not retriable"
                    );
                    summary.skipped += 1;
                }
                RetryOutcome::Cancelled => {
                    tracing::info!(
                        shard = %self.shard_id,
                        position = %record.position,
                        "ownership revoked, abandoning batch"
                    );
                    summary.interrupted = true;
                    return summary;
                }
            }
        }

        summary.checkpoint = self
            .scheduler
            .on_batch_processed(
                &self.shard_id,
                self.reassembler.last_completion(),
                checkpointer,
                &self.ownership,
            )
            .await;

        tracing::debug!(
            shard = %self.shard_id,
            delivered = summary.delivered,
            dropped = summary.dropped,
            skipped = summary.skipped,
            "batch done"
        );
        summary
    }

    /// Release the shard. A graceful handoff commits the last completed
    /// position; lost ownership cancels the ownership token and commits
    /// nothing.
    pub async fn close(
        &mut self,
        reason: ShutdownReason,
        checkpointer: &dyn Checkpointer,
    ) -> Option<CommitOutcome> {
        tracing::info!(shard = %self.shard_id, %reason, "shutting down shard processor");
        match reason {
            ShutdownReason::GracefulHandoff => Some(
                self.scheduler
                    .commit(
                        &self.shard_id,
                        self.reassembler.last_completion(),
                        checkpointer,
                        &self.ownership,
                    )
                    .await,
            ),
            ShutdownReason::OwnershipLost => {
                self.ownership.cancel();
                None
            }
        }
    }

    fn process_record(&mut self, record: &TransportRecord) -> Result<Delivery, StreamError> {
        let message = match self.undelivered.take() {
            Some(message) => message,
            None => match self.assemble(record) {
                Assembly::Incomplete => return Ok(Delivery::Pending),
                Assembly::Dropped => return Ok(Delivery::Dropped),
                Assembly::Complete(message) => message,
            },
        };

        match self.handler.handle(&message) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(e) => {
                self.undelivered = Some(message);
                Err(e)
            }
        }
    }

    fn assemble(&mut self, record: &TransportRecord) -> Assembly {
        let ingest = self.reassembler.ingest(record);

        if let Some(loss) = &ingest.loss {
            match &loss.abandoned {
                Some(chain) => tracing::warn!(
                    shard = %self.shard_id,
                    topic = %chain.topic,
                    partition = chain.partition,
                    offset = chain.offset,
                    chunks_received = loss.chunks_received,
                    observed = %loss.observed,
                    "data loss: chain abandoned before completion"
                ),
                None => tracing::warn!(
                    shard = %self.shard_id,
                    observed = %loss.observed,
                    "data loss: source moved past an unfinished chain"
                ),
            }
        }

        match ingest.outcome {
            Outcome::Pending => Assembly::Incomplete,
            Outcome::Discarded(Discard::MalformedHeader(e)) => {
                tracing::error!(
                    shard = %self.shard_id,
                    position = %record.position,
                    error = %e,
                    "malformed chunk header, discarding record"
                );
                Assembly::Dropped
            }
            Outcome::Discarded(Discard::InvalidNumbering(e)) => {
                tracing::error!(
                    shard = %self.shard_id,
                    position = %record.position,
                    error = %e,
                    "chunk numbered outside its chain, discarding record"
                );
                Assembly::Dropped
            }
            Outcome::Discarded(reason) => {
                tracing::debug!(
                    shard = %self.shard_id,
                    position = %record.position,
                    reason = reason.as_str(),
                    "chunk discarded"
                );
                Assembly::Dropped
            }
            Outcome::Assembled(assembled) => match decode_message(&assembled.payload) {
                Ok(document) => Assembly::Complete(Message {
                    partition: assembled.chain.partition,
                    offset: assembled.chain.offset,
                    document,
                }),
                Err(e) => {
                    tracing::error!(
                        shard = %self.shard_id,
                        chain = %assembled.chain,
                        error = %e,
                        "cannot decode message, dropping"
                    );
                    Assembly::Dropped
                }
            },
        }
    }
}

impl ShardRecordProcessor for ShardProcessor {
    fn initialize(&mut self, ctx: ShardContext) {
        self.shard_id = ctx.shard_id;
        tracing::info!(shard = %self.shard_id, "initializing shard processor");
    }

    fn process_batch<'a>(
        &'a mut self,
        records: Vec<TransportRecord>,
        checkpointer: &'a dyn Checkpointer,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.process_records(records, checkpointer).await;
        })
    }

    fn shutdown<'a>(
        &'a mut self,
        reason: ShutdownReason,
        checkpointer: &'a dyn Checkpointer,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.close(reason, checkpointer).await;
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Factory
// ═══════════════════════════════════════════════════════════════

/// Builds one [`ShardProcessor`] per shard, all sharing the config and the
/// message handler.
pub struct ProcessorFactory {
    config: ProcessorConfig,
    handler: Arc<dyn MessageHandler>,
}

impl ProcessorFactory {
    pub fn new(
        config: ProcessorConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, handler })
    }

    pub fn processor(&self) -> ShardProcessor {
        ShardProcessor::new(&self.config, self.handler.clone())
    }
}

impl ShardProcessorFactory for ProcessorFactory {
    fn create(&self) -> Box<dyn ShardRecordProcessor> {
        Box::new(self.processor())
    }
}
