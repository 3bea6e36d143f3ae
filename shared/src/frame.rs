use std::fmt;

/// Size of every message exchanged in either direction.
pub const FRAME_SIZE: usize = 1024;
/// Bytes occupied by the little-endian `i32` header.
pub const HEADER_SIZE: usize = 4;
/// Bytes available for arguments or response payload in one frame.
pub const PAYLOAD_CAPACITY: usize = FRAME_SIZE - HEADER_SIZE;

/// One fixed-size protocol message: a header and a zero-padded payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_SIZE],
}

impl Frame {
    /// Builds a frame from a header and up to [`PAYLOAD_CAPACITY`] payload
    /// bytes. Excess bytes are dropped; the caller chunks long payloads.
    pub fn encode(header: i32, payload: &[u8]) -> Self {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[..HEADER_SIZE].copy_from_slice(&header.to_le_bytes());
        let len = payload.len().min(PAYLOAD_CAPACITY);
        bytes[HEADER_SIZE..HEADER_SIZE + len].copy_from_slice(&payload[..len]);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; FRAME_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn header(&self) -> i32 {
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&self.bytes[..HEADER_SIZE]);
        i32::from_le_bytes(raw)
    }

    /// The full payload region, including trailing padding.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.bytes
    }

    /// Frames needed to carry `payload_len` bytes (an empty payload still
    /// takes one frame).
    pub fn chunk_count(payload_len: usize) -> usize {
        payload_len.div_ceil(PAYLOAD_CAPACITY).max(1)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self
            .payload()
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |last| last + 1);
        f.debug_struct("Frame")
            .field("header", &self.header())
            .field("payload_used", &used)
            .finish()
    }
}
