use crate::error::HeaderError;
use crate::header::{ChunkHeader, encode_chunk};

/// Producer side: cut `message` into chunk records of at most
/// `max_payload` payload bytes each, all sharing one chain key.
///
/// An empty message still yields a single chunk.
pub fn split_message(
    topic: &str,
    partition: i32,
    offset: i64,
    message: &[u8],
    max_payload: usize,
) -> Result<Vec<Vec<u8>>, HeaderError> {
    let max_payload = max_payload.max(1);
    let pieces: Vec<&[u8]> = if message.is_empty() {
        vec![message]
    } else {
        message.chunks(max_payload).collect()
    };
    let total_chunks =
        i32::try_from(pieces.len()).map_err(|_| HeaderError::TooManyChunks(pieces.len()))?;

    let mut records = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.into_iter().enumerate() {
        let header = ChunkHeader {
            topic: topic.to_string(),
            partition,
            offset,
            chunk: i as i32 + 1,
            total_chunks,
        };
        let mut record = Vec::new();
        encode_chunk(&header, piece, &mut record)?;
        records.push(record);
    }
    Ok(records)
}
