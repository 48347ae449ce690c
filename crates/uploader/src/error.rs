//! Uploader error types.

use roost_transfer::TransferError;
use roost_upload_client::TransportError;

/// Outcome of an upload run that did not produce an artifact.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Contract violation by the caller (bad sizes, indices, transitions),
    /// reported before the session is touched. Never retried.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("invalid upload configuration: {0}")]
    InvalidConfig(String),

    /// Retries exhausted, a permanent rejection, or the time budget ran out.
    /// The session keeps its acknowledged chunks and can be resumed.
    #[error(
        "upload session {session_id} failed with {acknowledged}/{total_chunks} chunks acknowledged: {last_error}"
    )]
    SessionFailed {
        session_id: String,
        last_error: TransportError,
        acknowledged: usize,
        total_chunks: usize,
    },

    /// Reading the payload failed partway through a run. The session is
    /// marked failed and can be resumed once the source is readable again.
    #[error(
        "upload session {session_id} failed with {acknowledged}/{total_chunks} chunks acknowledged: {error}"
    )]
    LocalFailure {
        session_id: String,
        #[source]
        error: TransferError,
        acknowledged: usize,
        total_chunks: usize,
    },

    /// The caller cancelled the run.
    #[error(
        "upload session {session_id} cancelled with {acknowledged}/{total_chunks} chunks acknowledged"
    )]
    Cancelled {
        session_id: String,
        acknowledged: usize,
        total_chunks: usize,
    },
}

impl UploadError {
    /// Returns `true` if the session may be resumed later.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Self::SessionFailed { .. } | Self::LocalFailure { .. } | Self::Cancelled { .. }
        )
    }
}
