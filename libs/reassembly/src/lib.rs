//! Chunk reassembly for chunked stream records.
//!
//! Producers split one source message (identified by topic, partition and
//! offset) into several transport records, each prefixed with a JSON
//! [`ChunkHeader`]. A [`Reassembler`] owned by one shard processor turns
//! those records back into whole payloads, strictly in delivery order:
//!
//! - chunks must arrive as `1, 2, .., totalChunks` with nothing from other
//!   chains in between; duplicates of already appended chunks are ignored;
//! - a missing chunk or an interleaved chain abandons the chain in flight,
//!   and the machine drops continuation chunks until a new `chunk == 1`;
//! - an [`OffsetTable`] of the last offset seen per topic/partition decides
//!   whether the abandoned chain means data loss ([`DataLoss`]).
//!
//! ```
//! use reassembly::{Outcome, Reassembler, split_message};
//! use stream_api::TransportRecord;
//!
//! let records = split_message("clicks", 0, 100, b"hello world", 4).unwrap();
//! let mut reassembler = Reassembler::new();
//! let mut assembled = None;
//! for (seq, data) in records.into_iter().enumerate() {
//!     let ingest = reassembler.ingest(&TransportRecord::new(data, seq as u64));
//!     if let Outcome::Assembled(message) = ingest.outcome {
//!         assembled = Some(message.payload);
//!     }
//! }
//! assert_eq!(assembled.as_deref(), Some(&b"hello world"[..]));
//! ```

mod error;
mod header;
mod offsets;
mod split;
mod state;

pub use error::HeaderError;
pub use header::{ChainKey, ChunkFrame, ChunkHeader, HEADER_LEN_BYTES, decode_chunk, encode_chunk};
pub use offsets::OffsetTable;
pub use split::split_message;
pub use state::{
    AssembledMessage, DataLoss, Discard, Ingest, Outcome, Phase, ReassemblyState, Reassembler,
};
