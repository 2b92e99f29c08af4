/// A chunk record whose header could not be decoded or violates the
/// header schema. The record carries no usable chain key.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("negative header length: {0}")]
    NegativeLength(i32),

    #[error("header json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid chunk numbering: chunk {chunk} of {total_chunks}")]
    InvalidNumbering { chunk: i32, total_chunks: i32 },

    #[error("header too large: {0} bytes")]
    TooLarge(usize),

    #[error("message needs {0} chunks, more than a header can count")]
    TooManyChunks(usize),
}
