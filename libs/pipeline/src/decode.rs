use std::io::Read;

/// Why an assembled payload could not be turned into a document.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Broken gzip stream, truncated data or non UTF-8 content.
    #[error("corrupt payload: {0}")]
    CorruptPayload(#[source] std::io::Error),
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Gunzip `data` into UTF-8 text. Concatenated gzip members are read as
/// one stream.
pub fn decompress(data: &[u8]) -> Result<String, DecodeError> {
    let mut decoder = flate2::read::MultiGzDecoder::new(data);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(DecodeError::CorruptPayload)?;
    Ok(text)
}

/// Decode an assembled chain payload: gzip-compressed UTF-8 JSON.
pub fn decode_message(data: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let text = decompress(data)?;
    Ok(serde_json::from_str(&text)?)
}
