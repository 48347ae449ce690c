//! Wire types for the Roost chunked media upload API.
//!
//! Shared by the HTTP transport, the upload orchestrator and the on-disk
//! session records.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{ChunkAck, CompleteUploadRequest, CompleteUploadResponse, ErrorResponse};
pub use types::{Artifact, UploadProgress, UploadStatus};
