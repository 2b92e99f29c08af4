use std::cmp::Ordering;

use stream_api::{CheckpointToken, TransportRecord};

use crate::error::HeaderError;
use crate::header::{ChainKey, ChunkHeader, decode_chunk};
use crate::offsets::OffsetTable;

// ═══════════════════════════════════════════════════════════════
//  Results of one ingest
// ═══════════════════════════════════════════════════════════════

/// A chain whose chunks all arrived in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub chain: ChainKey,
    /// Concatenated payload slices of chunks `1..=totalChunks`.
    pub payload: Vec<u8>,
    /// Position of the record carrying the last chunk.
    pub token: CheckpointToken,
}

/// Why a record did not advance any chain.
#[derive(Debug)]
pub enum Discard {
    MalformedHeader(HeaderError),
    /// Continuation chunk while waiting for a fresh `chunk == 1`.
    Suppressed,
    /// Chunk of the current chain that was already appended.
    Duplicate,
    /// Chunk of the current chain arriving after a missing one.
    Gap,
    /// Continuation chunk of some other chain.
    Interleaved,
    /// Header decoded but `chunk` lies outside `1..=totalChunks`.
    InvalidNumbering(HeaderError),
}

impl Discard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Discard::MalformedHeader(_) => "malformed_header",
            Discard::Suppressed => "suppressed",
            Discard::Duplicate => "duplicate",
            Discard::Gap => "gap",
            Discard::Interleaved => "interleaved",
            Discard::InvalidNumbering(_) => "invalid_numbering",
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Chunk appended, chain still incomplete.
    Pending,
    Assembled(AssembledMessage),
    Discarded(Discard),
}

/// Diagnostic event: a chain was abandoned before completion while the
/// source had already moved past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLoss {
    /// Chain in flight when the loss was detected (`None` if idle).
    pub abandoned: Option<ChainKey>,
    /// Chunks of the abandoned chain received so far.
    pub chunks_received: i32,
    /// Chain of the record that revealed the loss.
    pub observed: ChainKey,
}

/// Result of feeding one record to the reassembler.
#[derive(Debug)]
pub struct Ingest {
    pub outcome: Outcome,
    pub loss: Option<DataLoss>,
}

impl Ingest {
    fn new(outcome: Outcome) -> Self {
        Self { outcome, loss: None }
    }

    fn with_loss(outcome: Outcome, loss: Option<DataLoss>) -> Self {
        Self { outcome, loss }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ReassemblyState
// ═══════════════════════════════════════════════════════════════

/// Coarse state of the reassembly machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready for a new chain; continuation chunks of unknown chains are
    /// treated as interleaving.
    Idle,
    /// Dropping continuation chunks until a `chunk == 1` arrives.
    Suppressing,
    /// Collecting the chunks of `chain`.
    Accumulating,
}

/// Progress of the chain currently being collected on one shard.
///
/// `buffer` is non-empty only while accumulating, and suppression never
/// overlaps accumulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassemblyState {
    chain: Option<ChainKey>,
    next_chunk: i32,
    buffer: Vec<u8>,
    suppressing: bool,
    last_completion: Option<CheckpointToken>,
}

impl Default for ReassemblyState {
    /// Starts suppressing: continuation chunks seen before the first
    /// `chunk == 1` belong to chains whose head was never delivered.
    fn default() -> Self {
        Self {
            chain: None,
            next_chunk: 1,
            buffer: Vec::new(),
            suppressing: true,
            last_completion: None,
        }
    }
}

impl ReassemblyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle() -> Self {
        Self {
            suppressing: false,
            ..Self::default()
        }
    }

    /// Mid-chain state: `next_chunk - 1` chunks of `chain` already in `buffer`.
    pub fn accumulating(chain: ChainKey, next_chunk: i32, buffer: Vec<u8>) -> Self {
        debug_assert!(next_chunk > 1, "accumulating state needs next_chunk > 1");
        Self {
            chain: Some(chain),
            next_chunk,
            buffer,
            suppressing: false,
            last_completion: None,
        }
    }

    pub fn with_last_completion(mut self, token: CheckpointToken) -> Self {
        self.last_completion = Some(token);
        self
    }

    pub fn phase(&self) -> Phase {
        if self.next_chunk > 1 {
            Phase::Accumulating
        } else if self.suppressing {
            Phase::Suppressing
        } else {
            Phase::Idle
        }
    }

    pub fn chain(&self) -> Option<&ChainKey> {
        self.chain.as_ref()
    }

    pub fn next_chunk(&self) -> i32 {
        self.next_chunk
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppressing
    }

    /// Token of the record that completed the most recent chain.
    pub fn last_completion(&self) -> Option<&CheckpointToken> {
        self.last_completion.as_ref()
    }

    /// Apply one decoded chunk. `offsets` holds the values from *before*
    /// this record; the caller records the new offset afterwards.
    pub fn apply(
        &mut self,
        offsets: &OffsetTable,
        header: &ChunkHeader,
        payload: &[u8],
        position: &CheckpointToken,
    ) -> Ingest {
        let key = header.chain_key();

        if header.chunk == 1 {
            let loss = (self.next_chunk != 1
                && offsets.is_later(&header.topic, header.partition, header.offset))
            .then(|| self.loss_report(&key));

            self.buffer.clear();
            self.buffer.extend_from_slice(payload);
            self.next_chunk = 2;
            self.chain = Some(key.clone());
            self.suppressing = false;

            let outcome = if header.total_chunks == 1 {
                Outcome::Assembled(self.complete(key, position))
            } else {
                Outcome::Pending
            };
            return Ingest::with_loss(outcome, loss);
        }

        if self.suppressing {
            return Ingest::new(Outcome::Discarded(Discard::Suppressed));
        }

        if self.chain.as_ref() == Some(&key) {
            return match header.chunk.cmp(&self.next_chunk) {
                Ordering::Equal => {
                    self.buffer.extend_from_slice(payload);
                    self.next_chunk += 1;
                    if header.chunk == header.total_chunks {
                        Ingest::new(Outcome::Assembled(self.complete(key, position)))
                    } else {
                        Ingest::new(Outcome::Pending)
                    }
                }
                Ordering::Less => Ingest::new(Outcome::Discarded(Discard::Duplicate)),
                Ordering::Greater => {
                    let loss = self.loss_report(&key);
                    self.suppress();
                    Ingest::with_loss(Outcome::Discarded(Discard::Gap), Some(loss))
                }
            };
        }

        let loss = offsets
            .is_later(&header.topic, header.partition, header.offset)
            .then(|| self.loss_report(&key));
        self.suppress();
        Ingest::with_loss(Outcome::Discarded(Discard::Interleaved), loss)
    }

    fn complete(&mut self, chain: ChainKey, position: &CheckpointToken) -> AssembledMessage {
        self.last_completion = Some(position.clone());
        let payload = std::mem::take(&mut self.buffer);
        self.reset();
        AssembledMessage {
            chain,
            payload,
            token: position.clone(),
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.next_chunk = 1;
        self.chain = None;
    }

    fn suppress(&mut self) {
        self.reset();
        self.suppressing = true;
    }

    fn loss_report(&self, observed: &ChainKey) -> DataLoss {
        DataLoss {
            abandoned: self.chain.clone(),
            chunks_received: self.next_chunk - 1,
            observed: observed.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Reassembler
// ═══════════════════════════════════════════════════════════════

/// Per-shard reassembler: the chain state plus the offset table used for
/// loss detection.
#[derive(Debug, Clone, Default)]
pub struct Reassembler {
    state: ReassemblyState,
    offsets: OffsetTable,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(state: ReassemblyState, offsets: OffsetTable) -> Self {
        Self { state, offsets }
    }

    pub fn state(&self) -> &ReassemblyState {
        &self.state
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    pub fn last_completion(&self) -> Option<&CheckpointToken> {
        self.state.last_completion()
    }

    /// Feed one transport record.
    ///
    /// A record whose header cannot be decoded leaves both the state and the
    /// offset table untouched. Every other record updates the offset table,
    /// whatever the outcome; a chunk numbered outside its chain is discarded
    /// without touching the chain state.
    pub fn ingest(&mut self, record: &TransportRecord) -> Ingest {
        let frame = match decode_chunk(&record.data) {
            Ok(frame) => frame,
            Err(e) => return Ingest::new(Outcome::Discarded(Discard::MalformedHeader(e))),
        };
        let header = &frame.header;

        let ingest = match header.check_numbering() {
            Ok(()) => self
                .state
                .apply(&self.offsets, header, frame.payload, &record.position),
            Err(e) => Ingest::new(Outcome::Discarded(Discard::InvalidNumbering(e))),
        };
        self.offsets
            .record(&header.topic, header.partition, header.offset);

        tracing::trace!(
            chain = %header.chain_key(),
            chunk = header.chunk,
            total_chunks = header.total_chunks,
            phase = ?self.state.phase(),
            "chunk ingested"
        );
        ingest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::encode_chunk;

    fn chunk(offset: i64, chunk: i32, total_chunks: i32, payload: &[u8], seq: u64) -> TransportRecord {
        chunk_on("clicks", 0, offset, chunk, total_chunks, payload, seq)
    }

    fn chunk_on(
        topic: &str,
        partition: i32,
        offset: i64,
        chunk: i32,
        total_chunks: i32,
        payload: &[u8],
        seq: u64,
    ) -> TransportRecord {
        let header = ChunkHeader {
            topic: topic.to_string(),
            partition,
            offset,
            chunk,
            total_chunks,
        };
        let mut data = Vec::new();
        encode_chunk(&header, payload, &mut data).unwrap();
        TransportRecord::new(data, seq)
    }

    fn key(offset: i64) -> ChainKey {
        ChainKey { topic: "clicks".into(), partition: 0, offset }
    }

    #[test]
    fn starts_suppressing_stray_continuations() {
        let mut r = Reassembler::new();
        assert_eq!(r.state().phase(), Phase::Suppressing);

        let ingest = r.ingest(&chunk(7, 2, 3, b"mid", 1));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Suppressed)));
        assert!(ingest.loss.is_none());
        assert_eq!(r.state().phase(), Phase::Suppressing);
        assert_eq!(r.offsets().get("clicks", 0), Some(7));
    }

    #[test]
    fn two_chunk_chain_assembles_on_last_chunk() {
        let mut r = Reassembler::new();

        let first = r.ingest(&chunk(100, 1, 2, b"AB", 1));
        assert!(matches!(first.outcome, Outcome::Pending));
        assert_eq!(r.state().phase(), Phase::Accumulating);
        assert!(r.last_completion().is_none());

        let second = r.ingest(&chunk(100, 2, 2, b"CD", 2));
        match second.outcome {
            Outcome::Assembled(msg) => {
                assert_eq!(msg.payload, b"ABCD");
                assert_eq!(msg.token, CheckpointToken::from(2u64));
                assert_eq!(msg.chain, key(100));
            }
            other => panic!("expected assembled, got {other:?}"),
        }
        assert!(second.loss.is_none());
        assert_eq!(r.state().phase(), Phase::Idle);
        assert!(r.state().buffer().is_empty());
        assert!(r.state().chain().is_none());
        assert_eq!(r.last_completion(), Some(&CheckpointToken::from(2u64)));
    }

    #[test]
    fn single_chunk_chain_assembles_immediately() {
        let mut r = Reassembler::new();
        let ingest = r.ingest(&chunk(1, 1, 1, b"whole", 9));
        match ingest.outcome {
            Outcome::Assembled(msg) => assert_eq!(msg.payload, b"whole"),
            other => panic!("expected assembled, got {other:?}"),
        }
        assert_eq!(r.state().phase(), Phase::Idle);
        assert_eq!(r.last_completion(), Some(&CheckpointToken::from(9u64)));
    }

    #[test]
    fn in_order_chain_is_exact_concatenation() {
        for total in 1..=6 {
            let mut r = Reassembler::new();
            let pieces: Vec<Vec<u8>> = (0..total).map(|i| vec![b'a' + i as u8; i + 1]).collect();
            let mut assembled = Vec::new();
            for (i, piece) in pieces.iter().enumerate() {
                let ingest = r.ingest(&chunk(50, i as i32 + 1, total as i32, piece, i as u64));
                match ingest.outcome {
                    Outcome::Assembled(msg) => {
                        assert_eq!(i + 1, total, "assembled before the last chunk");
                        assembled.push(msg.payload);
                    }
                    Outcome::Pending => assert!(i + 1 < total),
                    other => panic!("unexpected {other:?}"),
                }
            }
            assert_eq!(assembled, vec![pieces.concat()]);
        }
    }

    #[test]
    fn missing_chunk_reports_loss_and_suppresses() {
        let mut r = Reassembler::new();
        assert!(matches!(r.ingest(&chunk(5, 1, 3, b"a", 1)).outcome, Outcome::Pending));

        let ingest = r.ingest(&chunk(5, 3, 3, b"c", 2));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Gap)));
        assert_eq!(
            ingest.loss,
            Some(DataLoss { abandoned: Some(key(5)), chunks_received: 1, observed: key(5) })
        );
        assert_eq!(r.state().phase(), Phase::Suppressing);
        assert!(r.state().buffer().is_empty());

        // late chunk 2 of the abandoned chain is dropped too
        let late = r.ingest(&chunk(5, 2, 3, b"b", 3));
        assert!(matches!(late.outcome, Outcome::Discarded(Discard::Suppressed)));

        // a fresh chain ends suppression
        assert!(matches!(r.ingest(&chunk(6, 1, 2, b"x", 4)).outcome, Outcome::Pending));
        assert_eq!(r.state().phase(), Phase::Accumulating);
        assert!(r.last_completion().is_none());
    }

    #[test]
    fn duplicate_chunk_leaves_state_alone() {
        let state = ReassemblyState::accumulating(key(10), 3, b"onetwo".to_vec());
        let mut r = Reassembler::from_parts(state.clone(), OffsetTable::new());

        let ingest = r.ingest(&chunk(10, 2, 4, b"two", 1));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Duplicate)));
        assert!(ingest.loss.is_none());
        assert_eq!(r.state(), &state);
        assert_eq!(r.offsets().get("clicks", 0), Some(10));
    }

    #[test]
    fn interleaving_newer_chain_reports_loss() {
        let mut offsets = OffsetTable::new();
        offsets.record("clicks", 0, 10);
        let state = ReassemblyState::accumulating(key(10), 2, b"a".to_vec());
        let mut r = Reassembler::from_parts(state, offsets);

        let ingest = r.ingest(&chunk(11, 2, 2, b"?", 1));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Interleaved)));
        assert_eq!(
            ingest.loss,
            Some(DataLoss { abandoned: Some(key(10)), chunks_received: 1, observed: key(11) })
        );
        assert_eq!(r.state().phase(), Phase::Suppressing);
        assert_eq!(r.offsets().get("clicks", 0), Some(11));
    }

    #[test]
    fn interleaving_older_or_unknown_chain_is_silent() {
        // older offset on the same key
        let mut offsets = OffsetTable::new();
        offsets.record("clicks", 0, 10);
        let state = ReassemblyState::accumulating(key(10), 2, b"a".to_vec());
        let mut r = Reassembler::from_parts(state, offsets);
        let ingest = r.ingest(&chunk(4, 2, 2, b"?", 1));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Interleaved)));
        assert!(ingest.loss.is_none());
        // last write wins, even going backwards
        assert_eq!(r.offsets().get("clicks", 0), Some(4));

        // key never seen before
        let state = ReassemblyState::accumulating(key(10), 2, b"a".to_vec());
        let mut r = Reassembler::from_parts(state, OffsetTable::new());
        let ingest = r.ingest(&chunk_on("other", 3, 99, 2, 2, b"?", 1));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Interleaved)));
        assert!(ingest.loss.is_none());
        assert_eq!(r.state().phase(), Phase::Suppressing);
    }

    #[test]
    fn continuation_after_completion_is_interleaving() {
        let mut r = Reassembler::from_parts(ReassemblyState::idle(), OffsetTable::new());
        r.ingest(&chunk(1, 1, 1, b"done", 1));

        let ingest = r.ingest(&chunk(2, 2, 2, b"?", 2));
        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::Interleaved)));
        assert_eq!(
            ingest.loss,
            Some(DataLoss { abandoned: None, chunks_received: 0, observed: key(2) })
        );
        // completion token survives the reset
        assert_eq!(r.last_completion(), Some(&CheckpointToken::from(1u64)));
    }

    #[test]
    fn new_head_mid_chain_abandons_previous_chain() {
        let mut r = Reassembler::new();
        r.ingest(&chunk(20, 1, 3, b"a", 1));

        let ingest = r.ingest(&chunk(21, 1, 2, b"n", 2));
        assert!(matches!(ingest.outcome, Outcome::Pending));
        assert_eq!(
            ingest.loss,
            Some(DataLoss { abandoned: Some(key(20)), chunks_received: 1, observed: key(21) })
        );
        assert_eq!(r.state().chain(), Some(&key(21)));
        assert_eq!(r.state().buffer(), b"n");
    }

    #[test]
    fn restarted_head_of_same_chain_is_silent() {
        let mut r = Reassembler::new();
        r.ingest(&chunk(20, 1, 3, b"a", 1));
        r.ingest(&chunk(20, 2, 3, b"b", 2));

        let ingest = r.ingest(&chunk(20, 1, 3, b"a", 3));
        assert!(matches!(ingest.outcome, Outcome::Pending));
        assert!(ingest.loss.is_none());
        assert_eq!(r.state().next_chunk(), 2);
        assert_eq!(r.state().buffer(), b"a");
    }

    #[test]
    fn malformed_header_touches_nothing() {
        let state = ReassemblyState::accumulating(key(3), 2, b"a".to_vec())
            .with_last_completion(CheckpointToken::new("prev"));
        let mut r = Reassembler::from_parts(state.clone(), OffsetTable::new());

        let ingest = r.ingest(&TransportRecord::new(b"\x00\x00\x00\x05{bad".to_vec(), 1u64));
        assert!(matches!(
            ingest.outcome,
            Outcome::Discarded(Discard::MalformedHeader(HeaderError::Truncated { .. }))
        ));
        assert_eq!(r.state(), &state);
        assert!(r.offsets().is_empty());
    }

    fn raw_chunk(header_json: &str, seq: u64) -> TransportRecord {
        let mut data = (header_json.len() as i32).to_be_bytes().to_vec();
        data.extend_from_slice(header_json.as_bytes());
        TransportRecord::new(data, seq)
    }

    #[test]
    fn bad_numbering_is_discarded_but_offset_recorded() {
        let mut r = Reassembler::from_parts(ReassemblyState::idle(), OffsetTable::new());

        let ingest = r.ingest(&raw_chunk(
            r#"{"topic":"t","partition":0,"offset":42,"chunk":3,"totalChunks":2}"#,
            1,
        ));

        assert!(matches!(
            ingest.outcome,
            Outcome::Discarded(Discard::InvalidNumbering(HeaderError::InvalidNumbering {
                chunk: 3,
                total_chunks: 2
            }))
        ));
        assert!(ingest.loss.is_none());
        assert_eq!(r.offsets().get("t", 0), Some(42));
        assert_eq!(r.state().phase(), Phase::Idle);
    }

    #[test]
    fn bad_numbering_mid_chain_keeps_chain() {
        let state = ReassemblyState::accumulating(key(3), 2, b"a".to_vec());
        let mut r = Reassembler::from_parts(state.clone(), OffsetTable::new());

        let ingest = r.ingest(&raw_chunk(
            r#"{"topic":"clicks","partition":0,"offset":3,"chunk":0,"totalChunks":2}"#,
            1,
        ));

        assert!(matches!(ingest.outcome, Outcome::Discarded(Discard::InvalidNumbering(_))));
        assert_eq!(r.state(), &state);
        assert_eq!(r.offsets().get("clicks", 0), Some(3));

        let ingest = r.ingest(&chunk(3, 2, 2, b"b", 2));
        assert!(matches!(ingest.outcome, Outcome::Assembled(ref m) if m.payload == b"ab"));
    }

    #[test]
    fn offset_table_follows_every_decoded_record() {
        let mut r = Reassembler::new();
        let records = [
            chunk(8, 2, 2, b"", 1),                    // suppressed
            chunk(9, 1, 2, b"a", 2),                   // pending
            chunk(9, 1, 2, b"a", 3),                   // restart
            chunk_on("views", 1, 77, 2, 3, b"", 4),    // interleaved
            chunk(12, 1, 1, b"z", 5),                  // assembled
        ];
        let expected = [
            ("clicks", 0, 8),
            ("clicks", 0, 9),
            ("clicks", 0, 9),
            ("views", 1, 77),
            ("clicks", 0, 12),
        ];
        for (record, (topic, partition, offset)) in records.iter().zip(expected) {
            r.ingest(record);
            assert_eq!(r.offsets().get(topic, partition), Some(offset));
        }
        assert_eq!(r.offsets().len(), 2);
    }
}
