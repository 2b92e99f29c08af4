//! Record files: every transport record is stored as
//! `[u32 BE length][record bytes]`, back to back.

pub const LENGTH_BYTES: usize = 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame too large: {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("truncated frame at byte {at}: need {needed} bytes, {available} left")]
    Truncated {
        at: usize,
        needed: usize,
        available: usize,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LengthPrefixed {
    /// Largest accepted frame payload (0 = no limit).
    max_payload: usize,
}

impl LengthPrefixed {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Decode one frame from the start of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete frame,
    /// otherwise the payload and the number of bytes consumed.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, FramingError> {
        if buf.len() < LENGTH_BYTES {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if self.max_payload > 0 && len > self.max_payload {
            return Err(FramingError::TooLarge {
                len,
                max: self.max_payload,
            });
        }

        let total = LENGTH_BYTES + len;
        if buf.len() < total {
            return Ok(None);
        }
        Ok(Some((buf[LENGTH_BYTES..total].to_vec(), total)))
    }

    /// Decode every frame of a complete file. Leftover bytes that do not
    /// form a whole frame are an error.
    pub fn decode_all(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>, FramingError> {
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < buf.len() {
            match self.decode(&buf[pos..])? {
                Some((frame, consumed)) => {
                    frames.push(frame);
                    pos += consumed;
                }
                None => {
                    let available = buf.len() - pos;
                    let needed = if available < LENGTH_BYTES {
                        LENGTH_BYTES
                    } else {
                        let b = &buf[pos..];
                        LENGTH_BYTES + u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
                    };
                    return Err(FramingError::Truncated {
                        at: pos,
                        needed,
                        available,
                    });
                }
            }
        }
        Ok(frames)
    }

    pub fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), FramingError> {
        let len = data.len();
        let max = if self.max_payload > 0 {
            self.max_payload
        } else {
            u32::MAX as usize
        };
        if len > max {
            return Err(FramingError::TooLarge { len, max });
        }
        buf.extend_from_slice(&(len as u32).to_be_bytes());
        buf.extend_from_slice(data);
        Ok(())
    }
}
