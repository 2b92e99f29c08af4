use std::time::Duration;

use serde::Deserialize;

use crate::PipelineError;
use crate::retry::RetryPolicy;

// ═══════════════════════════════════════════════════════════════
//  Retry Config
// ═══════════════════════════════════════════════════════════════

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause after a failed attempt, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_backoff_ms() -> u64 {
    3_000
}

// ═══════════════════════════════════════════════════════════════
//  Checkpoint Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckpointConfig {
    /// Minimum time between two scheduled checkpoints, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(flatten)]
    pub retry: RetryConfig,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl CheckpointConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    60_000
}

// ═══════════════════════════════════════════════════════════════
//  Processor Config
// ═══════════════════════════════════════════════════════════════

/// Settings shared by all shard processors of one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProcessorConfig {
    /// Retries around ingest + decode + handler for a single record.
    #[serde(default)]
    pub processing: RetryConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.processing.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig {
                field: "processing.max_attempts",
                detail: "must be at least 1".into(),
            });
        }
        if self.checkpoint.retry.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig {
                field: "checkpoint.max_attempts",
                detail: "must be at least 1".into(),
            });
        }
        if self.checkpoint.interval_ms == 0 {
            return Err(PipelineError::InvalidConfig {
                field: "checkpoint.interval_ms",
                detail: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}
