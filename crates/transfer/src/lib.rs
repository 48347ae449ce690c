//! Chunked media transfer: partitioning, session bookkeeping and resume.
//!
//! A payload is split into fixed-size chunks addressed by index. An
//! [`UploadSession`] records which indices the backend has acknowledged so an
//! interrupted upload resumes at the lowest missing chunk, and a
//! [`SessionStore`] keeps that record across process restarts.

mod chunked;
mod session;
mod store;
mod types;

pub use chunked::{
    ChunkSource, FileSource, MemorySource, checksum_bytes, chunk_range, compute_chunk_count,
    slice_chunk,
};
pub use roost_protocol::constants::DEFAULT_CHUNK_SIZE;
pub use session::UploadSession;
pub use store::{SessionStore, default_state_dir};
pub use types::Chunk;

use roost_protocol::UploadStatus;

/// Errors produced by the transfer crate.
///
/// Everything except [`Io`](Self::Io) and [`Json`](Self::Json) signals a
/// contract violation by the caller and is never retried.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("chunk index {index} out of range (total chunks: {total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("invalid chunk index {index} for session with {total} chunks")]
    InvalidIndex { index: usize, total: usize },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: UploadStatus,
        to: UploadStatus,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
