use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pipeline::{BatchSummary, ProcessorFactory};
use stream_api::{
    Message, MessageHandler, ShardContext, ShardRecordProcessor, ShutdownReason, StreamError,
    TransportRecord,
};

use crate::config::{Effective, ReplayArgs};
use crate::error::AppError;
use crate::framing::LengthPrefixed;
use crate::store::FileCheckpointStore;

/// Largest transport record accepted from a record file.
const MAX_RECORD_BYTES: usize = 1024 * 1024;

// ═══════════════════════════════════════════════════════════════
//  Handler
// ═══════════════════════════════════════════════════════════════

/// Logs every message; with `print` also writes it to stdout as one
/// JSON line.
struct LogHandler {
    print: bool,
}

impl MessageHandler for LogHandler {
    fn handle(&self, message: &Message) -> Result<(), StreamError> {
        tracing::info!(
            partition = message.partition,
            offset = message.offset,
            document = %message.document,
            "message received"
        );
        if self.print {
            let line = serde_json::json!({
                "partition": message.partition,
                "offset": message.offset,
                "document": message.document,
            });
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{line}")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Replay
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records already covered by the stored checkpoint.
    pub resumed_after: u64,
    pub batches: usize,
    pub records: usize,
    pub delivered: usize,
    pub skipped: usize,
    /// Stopped in the middle of a batch; no final checkpoint was taken.
    pub interrupted: bool,
}

impl ReplayStats {
    fn add(&mut self, summary: &BatchSummary) {
        self.batches += 1;
        self.records += summary.records;
        self.delivered += summary.delivered;
        self.skipped += summary.skipped;
    }
}

pub async fn run(args: ReplayArgs) -> Result<(), AppError> {
    let eff = Effective::new(&args)?;
    tracing::info!(
        shard = %eff.shard_id,
        input = %args.input.display(),
        checkpoint = %args.checkpoint.display(),
        "unchunk replay starting"
    );

    let stop = CancellationToken::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping");
                stop.cancel();
            }
        }
    });

    let store = FileCheckpointStore::new(&args.checkpoint);
    let handler = Arc::new(LogHandler { print: args.print });
    let stats = replay(&eff, &args.input, &store, handler, &stop).await?;

    tracing::info!(
        shard = %eff.shard_id,
        resumed_after = stats.resumed_after,
        batches = stats.batches,
        records = stats.records,
        delivered = stats.delivered,
        skipped = stats.skipped,
        interrupted = stats.interrupted,
        "replay finished"
    );
    Ok(())
}

/// Drive one shard processor over the records in `input` the way the stream
/// runtime would: resume after the stored checkpoint, feed batches, then
/// hand the shard off gracefully at end of input or when `stop` fires
/// between batches. A stop during a batch (e.g. in a handler backoff)
/// abandons it at once and leaves the stored checkpoint as it was.
async fn replay(
    eff: &Effective,
    input: &Path,
    store: &FileCheckpointStore,
    handler: Arc<dyn MessageHandler>,
    stop: &CancellationToken,
) -> Result<ReplayStats, AppError> {
    let data = tokio::fs::read(input)
        .await
        .map_err(|e| AppError::io(input, e))?;
    let frames = LengthPrefixed::new(MAX_RECORD_BYTES).decode_all(&data)?;

    let resumed_after = resume_position(store).await?;
    let mut stats = ReplayStats {
        resumed_after,
        ..ReplayStats::default()
    };
    if resumed_after > 0 {
        tracing::info!(shard = %eff.shard_id, resumed_after, "resuming after checkpoint");
    }

    let factory = ProcessorFactory::new(eff.processor.clone(), handler)?;
    let mut processor = factory.processor();
    processor.initialize(ShardContext {
        shard_id: eff.shard_id.clone(),
    });

    let mut records = frames
        .into_iter()
        .zip(1u64..)
        .filter(|(_, seq)| *seq > resumed_after)
        .map(|(data, seq)| TransportRecord::new(data, seq));

    loop {
        if stop.is_cancelled() {
            break;
        }
        let batch: Vec<TransportRecord> = records.by_ref().take(eff.batch_size).collect();
        if batch.is_empty() {
            break;
        }
        tokio::select! {
            summary = processor.process_records(batch, store) => stats.add(&summary),
            _ = stop.cancelled() => {
                stats.interrupted = true;
                break;
            }
        }
    }

    if stats.interrupted {
        // The last assembled message may not have reached the handler yet.
        tracing::warn!(shard = %eff.shard_id, "interrupted mid-batch, skipping final checkpoint");
    } else {
        processor.close(ShutdownReason::GracefulHandoff, store).await;
    }
    Ok(stats)
}

async fn resume_position(store: &FileCheckpointStore) -> Result<u64, AppError> {
    let Some(token) = store.load().await? else {
        return Ok(0);
    };
    token.as_str().parse().map_err(|_| AppError::Config {
        context: "checkpoint",
        detail: format!(
            "'{}' holds '{token}', expected a record sequence number",
            store.path().display()
        ),
    })
}
