use serde::{Deserialize, Serialize};

use crate::error::HeaderError;

/// Size of the big-endian header length prefix.
pub const HEADER_LEN_BYTES: usize = 4;

// ═══════════════════════════════════════════════════════════════
//  Chunk header
// ═══════════════════════════════════════════════════════════════

/// JSON header prepended to every chunk by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChunkHeader {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// 1-based position of this chunk in its chain.
    pub chunk: i32,
    pub total_chunks: i32,
}

impl ChunkHeader {
    pub fn chain_key(&self) -> ChainKey {
        ChainKey {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        }
    }

    /// `1 <= chunk <= totalChunks`. Decoding does not enforce this; the
    /// reassembler discards such chunks after recording their offset.
    pub fn check_numbering(&self) -> Result<(), HeaderError> {
        if self.chunk < 1 || self.total_chunks < 1 || self.chunk > self.total_chunks {
            return Err(HeaderError::InvalidNumbering {
                chunk: self.chunk,
                total_chunks: self.total_chunks,
            });
        }
        Ok(())
    }
}

/// Identity of a chain: all chunks of one source message share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl std::fmt::Display for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.topic, self.partition, self.offset)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Wire codec
// ═══════════════════════════════════════════════════════════════

/// A decoded chunk record borrowing its payload from the record bytes.
#[derive(Debug)]
pub struct ChunkFrame<'a> {
    pub header: ChunkHeader,
    pub payload: &'a [u8],
}

/// Split one record into header and payload.
///
/// Layout: `[i32 BE header length H][H bytes JSON header][payload...]`.
pub fn decode_chunk(data: &[u8]) -> Result<ChunkFrame<'_>, HeaderError> {
    if data.len() < HEADER_LEN_BYTES {
        return Err(HeaderError::Truncated {
            needed: HEADER_LEN_BYTES,
            available: data.len(),
        });
    }

    let len = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if len < 0 {
        return Err(HeaderError::NegativeLength(len));
    }

    let end = HEADER_LEN_BYTES + len as usize;
    if data.len() < end {
        return Err(HeaderError::Truncated {
            needed: end,
            available: data.len(),
        });
    }

    let header: ChunkHeader = serde_json::from_slice(&data[HEADER_LEN_BYTES..end])?;

    Ok(ChunkFrame {
        header,
        payload: &data[end..],
    })
}

/// Append one encoded chunk record to `out`.
pub fn encode_chunk(
    header: &ChunkHeader,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), HeaderError> {
    header.check_numbering()?;
    let json = serde_json::to_vec(header)?;
    let len = i32::try_from(json.len()).map_err(|_| HeaderError::TooLarge(json.len()))?;

    out.reserve(HEADER_LEN_BYTES + json.len() + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(header_json: &str, payload: &[u8]) -> Vec<u8> {
        let mut buf = (header_json.len() as i32).to_be_bytes().to_vec();
        buf.extend_from_slice(header_json.as_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn decodes_producer_layout() {
        let data = raw(
            r#"{"topic":"clicks","partition":2,"offset":100,"chunk":1,"totalChunks":3}"#,
            b"\x1f\x8b\x08",
        );
        let frame = decode_chunk(&data).unwrap();
        assert_eq!(frame.header.topic, "clicks");
        assert_eq!(frame.header.partition, 2);
        assert_eq!(frame.header.offset, 100);
        assert_eq!(frame.header.chunk, 1);
        assert_eq!(frame.header.total_chunks, 3);
        assert_eq!(frame.payload, b"\x1f\x8b\x08");
        assert_eq!(frame.header.chain_key().to_string(), "clicks/2@100");
    }

    #[test]
    fn empty_payload_is_allowed() {
        let data = raw(
            r#"{"topic":"t","partition":0,"offset":1,"chunk":1,"totalChunks":1}"#,
            b"",
        );
        assert!(decode_chunk(&data).unwrap().payload.is_empty());
    }

    #[test]
    fn short_prefix_is_truncated() {
        let err = decode_chunk(&[0, 0, 1]).unwrap_err();
        assert!(matches!(err, HeaderError::Truncated { needed: 4, available: 3 }));
    }

    #[test]
    fn header_longer_than_record_is_truncated() {
        let mut data = 500i32.to_be_bytes().to_vec();
        data.extend_from_slice(b"{}");
        assert!(matches!(
            decode_chunk(&data).unwrap_err(),
            HeaderError::Truncated { needed: 504, available: 6 }
        ));
    }

    #[test]
    fn negative_length_is_rejected() {
        let data = (-1i32).to_be_bytes();
        assert!(matches!(decode_chunk(&data).unwrap_err(), HeaderError::NegativeLength(-1)));
    }

    #[test]
    fn bad_json_and_unknown_fields_are_rejected() {
        let data = raw("{not json", b"x");
        assert!(matches!(decode_chunk(&data).unwrap_err(), HeaderError::Json(_)));

        let data = raw(
            r#"{"topic":"t","partition":0,"offset":1,"chunk":1,"totalChunks":1,"extra":true}"#,
            b"",
        );
        assert!(matches!(decode_chunk(&data).unwrap_err(), HeaderError::Json(_)));

        let data = raw(r#"{"topic":"t","partition":0,"offset":1,"chunk":1}"#, b"");
        assert!(matches!(decode_chunk(&data).unwrap_err(), HeaderError::Json(_)));
    }

    #[test]
    fn numbering_is_left_to_the_reassembler() {
        for (chunk, total) in [(0, 2), (3, 2), (1, 0), (-1, 1)] {
            let json = format!(
                r#"{{"topic":"t","partition":0,"offset":1,"chunk":{chunk},"totalChunks":{total}}}"#
            );
            let data = raw(&json, b"");
            let frame = decode_chunk(&data).unwrap();
            assert!(matches!(
                frame.header.check_numbering().unwrap_err(),
                HeaderError::InvalidNumbering { .. }
            ));
        }
    }

    #[test]
    fn encoder_refuses_bad_numbering() {
        let header = ChunkHeader {
            topic: "t".into(),
            partition: 0,
            offset: 1,
            chunk: 3,
            total_chunks: 2,
        };
        assert!(matches!(
            encode_chunk(&header, b"", &mut Vec::new()).unwrap_err(),
            HeaderError::InvalidNumbering { chunk: 3, total_chunks: 2 }
        ));
    }

    #[test]
    fn encode_then_decode_keeps_header_and_payload() {
        let header = ChunkHeader {
            topic: "orders".into(),
            partition: 7,
            offset: 9_000_000_000,
            chunk: 2,
            total_chunks: 2,
        };
        let mut out = Vec::new();
        encode_chunk(&header, b"tail", &mut out).unwrap();

        let frame = decode_chunk(&out).unwrap();
        assert_eq!(frame.header, header);
        assert_eq!(frame.payload, b"tail");

        let json = std::str::from_utf8(&out[4..out.len() - 4]).unwrap();
        assert!(json.contains("\"totalChunks\":2"));
    }
}
