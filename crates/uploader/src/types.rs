//! Events emitted while an upload runs.

use std::time::Duration;

use roost_protocol::{Artifact, UploadStatus};
use roost_upload_client::TransportError;

/// Progress event emitted by the [`Uploader`](crate::Uploader).
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// The session moved to a new status.
    StatusChanged {
        session_id: String,
        status: UploadStatus,
    },
    /// The backend confirmed a chunk.
    ChunkAcknowledged {
        session_id: String,
        index: usize,
        acknowledged: usize,
        total_chunks: usize,
    },
    /// A transport call failed and will be retried after `delay`.
    ///
    /// `index` is `None` for the finalize call.
    Retrying {
        session_id: String,
        index: Option<usize>,
        attempt: u32,
        delay: Duration,
        error: TransportError,
    },
    /// The backend reassembled the upload.
    Completed {
        session_id: String,
        artifact: Artifact,
    },
    /// The run ended in `failed`.
    Failed { session_id: String, error: String },
}
