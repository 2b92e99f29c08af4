use std::io::Read;

use reassembly::split_message;

use crate::config::SplitArgs;
use crate::error::AppError;
use crate::framing::LengthPrefixed;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub messages: usize,
    pub records: usize,
}

pub async fn run(args: SplitArgs) -> Result<(), AppError> {
    let input = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|e| AppError::io(&args.input, e))?;

    let mut out = Vec::new();
    let stats = split_lines(
        &input,
        &args.topic,
        args.partition,
        args.start_offset,
        args.chunk_size,
        &mut out,
    )?;

    tokio::fs::write(&args.output, &out)
        .await
        .map_err(|e| AppError::io(&args.output, e))?;
    tracing::info!(
        messages = stats.messages,
        records = stats.records,
        output = %args.output.display(),
        "split finished"
    );
    Ok(())
}

/// Gzip every non-blank JSON line, cut it into chunk records and append
/// them to `out` as length-prefixed frames. Messages get consecutive
/// offsets starting at `start_offset`.
pub fn split_lines(
    input: &str,
    topic: &str,
    partition: i32,
    start_offset: i64,
    chunk_size: usize,
    out: &mut Vec<u8>,
) -> Result<SplitStats, AppError> {
    let framing = LengthPrefixed::default();
    let mut stats = SplitStats::default();
    let mut offset = start_offset;

    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        serde_json::from_str::<serde_json::Value>(line)
            .map_err(|source| AppError::InvalidLine { line: i + 1, source })?;

        let compressed = gzip(line.as_bytes())?;
        for record in split_message(topic, partition, offset, &compressed, chunk_size)? {
            framing.encode(&record, out)?;
            stats.records += 1;
        }
        stats.messages += 1;
        offset += 1;
    }
    Ok(stats)
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut encoder = flate2::read::GzEncoder::new(data, flate2::Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(AppError::Gzip)?;
    Ok(compressed)
}
