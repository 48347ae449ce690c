use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// Chunk arithmetic
// ---------------------------------------------------------------------------

/// Number of chunks needed to cover `file_size` bytes: `ceil(file_size / chunk_size)`.
pub fn compute_chunk_count(file_size: u64, chunk_size: u64) -> Result<usize, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidInput(
            "chunk size must be positive".into(),
        ));
    }
    let count = file_size.div_ceil(chunk_size);
    usize::try_from(count)
        .map_err(|_| TransferError::InvalidInput(format!("chunk count {count} overflows usize")))
}

/// Byte range `[index*chunk_size, min((index+1)*chunk_size, file_size))` of a chunk.
pub fn chunk_range(
    file_size: u64,
    chunk_size: u64,
    index: usize,
) -> Result<Range<u64>, TransferError> {
    let total = compute_chunk_count(file_size, chunk_size)?;
    if index >= total {
        return Err(TransferError::IndexOutOfRange { index, total });
    }
    // index < total, so index * chunk_size < file_size and cannot overflow.
    let start = index as u64 * chunk_size;
    let end = start.saturating_add(chunk_size).min(file_size);
    Ok(start..end)
}

/// Copies chunk `index` out of an in-memory payload.
pub fn slice_chunk(payload: &[u8], index: usize, chunk_size: u64) -> Result<Chunk, TransferError> {
    let range = chunk_range(payload.len() as u64, chunk_size, index)?;
    let data = payload[range.start as usize..range.end as usize].to_vec();
    Ok(build_chunk(index, range, data))
}

fn build_chunk(index: usize, range: Range<u64>, data: Vec<u8>) -> Chunk {
    let checksum = checksum_bytes(&data);
    Chunk {
        index,
        start: range.start,
        end: range.end,
        data: Bytes::from(data),
        checksum,
    }
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Chunk sources
// ---------------------------------------------------------------------------

/// Random-access payload that chunks can be sliced from.
///
/// Sources hold no cursor: any index may be requested at any time and in any
/// order, which is what lets a resumed upload slice only the missing chunks.
pub trait ChunkSource: Send + Sync {
    /// Total payload size in bytes.
    fn len(&self) -> u64;

    /// Reads the bytes of `range`, which always lies within `[0, len())`.
    fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>, TransferError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces chunk `index` for the given chunk size.
    fn read_chunk(&self, index: usize, chunk_size: u64) -> Result<Chunk, TransferError> {
        let range = chunk_range(self.len(), chunk_size, index)?;
        let data = self.read_range(range.clone())?;
        Ok(build_chunk(index, range, data))
    }
}

/// Payload held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl ChunkSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
        self.data
            .get(range.start as usize..range.end as usize)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                TransferError::InvalidInput(format!(
                    "range {}..{} outside payload of {} bytes",
                    range.start,
                    range.end,
                    self.data.len()
                ))
            })
    }
}

/// Payload backed by a file on disk, read one chunk at a time.
///
/// The size is captured when the file is opened; a file that shrinks
/// afterwards surfaces as an I/O error on the affected chunk.
pub struct FileSource {
    file: Mutex<File>,
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Opens `path` for chunked reading.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            len,
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| TransferError::Io(std::io::Error::other("file source lock poisoned")))?;
        file.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
