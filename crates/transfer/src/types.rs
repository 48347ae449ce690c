use bytes::Bytes;

/// A slice of the payload addressed by chunk index.
///
/// Chunks are produced on demand and owned by the upload attempt that
/// requested them; nothing keeps them after the transport call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based chunk index.
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (exclusive).
    pub end: u64,
    /// Raw chunk data. Clones share the buffer.
    pub data: Bytes,
    /// SHA-256 hex checksum of `data`.
    pub checksum: String,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
