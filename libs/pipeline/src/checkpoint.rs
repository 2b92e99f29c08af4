use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use stream_api::{CheckpointToken, Checkpointer, ErrorKind};

use crate::config::CheckpointConfig;
use crate::retry::{RetryOutcome, RetryPolicy};

/// Result of one commit through the checkpoint retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CheckpointToken),
    /// No chain has completed on this shard yet.
    NothingToCommit,
    /// The shard is no longer owned by this worker.
    Fenced,
    /// The store rejected the commit for a reason retries cannot fix.
    PermanentFailure,
    ExhaustedRetries,
    Cancelled,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}

/// Decides when a shard commits its resume position and runs the commit.
#[derive(Debug, Clone)]
pub struct CheckpointScheduler {
    interval: Duration,
    retry: RetryPolicy,
    /// `None` means a checkpoint is due now.
    next_deadline: Option<Instant>,
}

impl CheckpointScheduler {
    pub fn new(config: &CheckpointConfig) -> Self {
        Self {
            interval: config.interval(),
            retry: config.retry.policy(),
            next_deadline: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline.is_none_or(|deadline| now > deadline)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Called after every processed batch. Commits `token` when the
    /// interval has elapsed and schedules the next deadline; returns `None`
    /// when nothing was due.
    pub async fn on_batch_processed(
        &mut self,
        shard_id: &str,
        token: Option<&CheckpointToken>,
        checkpointer: &dyn Checkpointer,
        cancel: &CancellationToken,
    ) -> Option<CommitOutcome> {
        if !self.is_due(Instant::now()) {
            return None;
        }
        let outcome = self.commit(shard_id, token, checkpointer, cancel).await;
        self.next_deadline = Some(Instant::now() + self.interval);
        Some(outcome)
    }

    /// Commit `token` now, retrying transient store failures.
    pub async fn commit(
        &self,
        shard_id: &str,
        token: Option<&CheckpointToken>,
        checkpointer: &dyn Checkpointer,
        cancel: &CancellationToken,
    ) -> CommitOutcome {
        let Some(token) = token else {
            tracing::debug!(shard = %shard_id, "no completed message yet, skipping checkpoint");
            return CommitOutcome::NothingToCommit;
        };

        tracing::info!(shard = %shard_id, %token, "checkpointing shard");
        let outcome = self
            .retry
            .execute(cancel, "checkpoint", |_| checkpointer.checkpoint(token))
            .await;

        match outcome {
            RetryOutcome::Success(()) => CommitOutcome::Committed(token.clone()),
            RetryOutcome::Abandoned(e) if e.kind() == ErrorKind::Fenced => {
                tracing::info!(
                    shard = %shard_id,
                    error = %e,
                    "shard no longer owned, skipping checkpoint"
                );
                CommitOutcome::Fenced
            }
            RetryOutcome::Abandoned(e) => {
                tracing::error!(
                    shard = %shard_id,
                    error = %e,
                    "cannot save checkpoint, giving up"
                );
                CommitOutcome::PermanentFailure
            }
            RetryOutcome::ExhaustedRetries { attempts, last_error } => {
                tracing::error!(
                    shard = %shard_id,
                    attempts,
                    error = %last_error,
                    "checkpoint failed after all retries"
                );
                CommitOutcome::ExhaustedRetries
            }
            RetryOutcome::Cancelled => {
                tracing::info!(shard = %shard_id, "checkpoint cancelled, ownership revoked");
                CommitOutcome::Cancelled
            }
        }
    }
}
