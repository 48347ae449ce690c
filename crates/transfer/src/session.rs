use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use roost_protocol::{Artifact, UploadProgress, UploadStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TransferError;
use crate::chunked::{chunk_range, compute_chunk_count};

/// Progress record of one logical upload.
///
/// The session owns its acknowledgment set exclusively; callers mutate it
/// through `&mut self` methods only, so a resume attempt and an in-flight
/// upload cannot both hold it. The set only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    id: String,
    file_size: u64,
    chunk_size: u64,
    total_chunks: usize,
    acknowledged: BTreeSet<usize>,
    status: UploadStatus,
    #[serde(default)]
    retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UploadSession {
    /// Creates a new pending session for a payload of `file_size` bytes.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if file_size == 0 {
            return Err(TransferError::InvalidInput(
                "payload is empty, nothing to upload".into(),
            ));
        }
        let total_chunks = compute_chunk_count(file_size, chunk_size)?;
        let now = Utc::now();
        Ok(Self {
            id: generate_session_id(),
            file_size,
            chunk_size,
            total_chunks,
            acknowledged: BTreeSet::new(),
            status: UploadStatus::Pending,
            retries: 0,
            error: None,
            artifact: None,
            source: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Attaches a label describing where the payload comes from (usually a path).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    // -- bookkeeping ---------------------------------------------------------

    /// Records that the backend stored chunk `index`.
    ///
    /// Idempotent: returns `Ok(false)` when the index was already recorded.
    pub fn mark_acknowledged(&mut self, index: usize) -> Result<bool, TransferError> {
        if index >= self.total_chunks {
            return Err(TransferError::InvalidIndex {
                index,
                total: self.total_chunks,
            });
        }
        let inserted = self.acknowledged.insert(index);
        if inserted {
            self.touch();
        }
        Ok(inserted)
    }

    /// Returns `true` once every chunk has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.acknowledged.len() == self.total_chunks
    }

    /// Smallest chunk index not yet acknowledged, or `None` when complete.
    pub fn next_pending_index(&self) -> Option<usize> {
        // The set is ordered, so the first index whose slot does not hold
        // its own value is the first gap.
        let mut expected = 0;
        for &index in &self.acknowledged {
            if index != expected {
                break;
            }
            expected += 1;
        }
        (expected < self.total_chunks).then_some(expected)
    }

    /// All unacknowledged indices in ascending order.
    pub fn pending_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.total_chunks).filter(|i| !self.acknowledged.contains(i))
    }

    /// Counts one retried transport call.
    pub fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
        self.touch();
    }

    // -- status transitions --------------------------------------------------

    /// Moves the session to `uploading`, starting or resuming it.
    ///
    /// Any state except `completed` may be resumed; a record left in
    /// `uploading` or `finalizing` by a crashed process is resumed as well.
    pub fn start(&mut self) -> Result<(), TransferError> {
        self.transition(UploadStatus::Uploading)?;
        self.error = None;
        Ok(())
    }

    /// Moves an uploading session whose chunks are all acknowledged to `finalizing`.
    pub fn begin_finalize(&mut self) -> Result<(), TransferError> {
        if !self.is_complete() {
            return Err(TransferError::InvalidInput(format!(
                "cannot finalize: {} of {} chunks acknowledged",
                self.acknowledged.len(),
                self.total_chunks
            )));
        }
        self.transition(UploadStatus::Finalizing)
    }

    /// Marks the session as completed with the backend's artifact reference.
    pub fn complete(&mut self, artifact: Artifact) -> Result<(), TransferError> {
        self.transition(UploadStatus::Completed)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Marks the session as failed with an error message.
    pub fn fail(&mut self, err: &str) -> Result<(), TransferError> {
        self.transition(UploadStatus::Failed)?;
        self.error = Some(err.to_string());
        Ok(())
    }

    /// Marks the session as cancelled; acknowledged chunks are kept.
    pub fn cancel(&mut self) -> Result<(), TransferError> {
        self.transition(UploadStatus::Cancelled)
    }

    fn transition(&mut self, to: UploadStatus) -> Result<(), TransferError> {
        use UploadStatus::*;

        let from = self.status;
        let allowed = match (from, to) {
            (Completed, _) => false,
            (_, Uploading) => true,
            (Uploading, Finalizing) | (Finalizing, Completed) => true,
            (Uploading | Finalizing, Failed) => true,
            (Pending | Uploading | Finalizing, Cancelled) => true,
            _ => false,
        };
        if !allowed {
            return Err(TransferError::InvalidTransition { from, to });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // -- accessors -----------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn acknowledged(&self) -> &BTreeSet<usize> {
        &self.acknowledged
    }

    pub fn acknowledged_count(&self) -> usize {
        self.acknowledged.len()
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Bytes covered by acknowledged chunks.
    pub fn transferred_bytes(&self) -> u64 {
        self.acknowledged
            .iter()
            .filter_map(|&i| chunk_range(self.file_size, self.chunk_size, i).ok())
            .map(|r| r.end - r.start)
            .sum()
    }

    /// Returns a progress snapshot suitable for display or serialization.
    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            session_id: self.id.clone(),
            status: self.status,
            total_chunks: self.total_chunks,
            acknowledged_chunks: self.acknowledged.len(),
            total_bytes: self.file_size,
            transferred_bytes: self.transferred_bytes(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
            error: self.error.clone().unwrap_or_default(),
        }
    }

    /// Re-checks the structural invariants of a record read from disk.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.id.is_empty() {
            return Err(TransferError::InvalidInput("session id is empty".into()));
        }
        if self.file_size == 0 {
            return Err(TransferError::InvalidInput(format!(
                "session {}: file size is zero",
                self.id
            )));
        }
        let expected = compute_chunk_count(self.file_size, self.chunk_size)?;
        if expected != self.total_chunks {
            return Err(TransferError::InvalidInput(format!(
                "session {}: total chunks {} does not match {} bytes in {} byte chunks",
                self.id, self.total_chunks, self.file_size, self.chunk_size
            )));
        }
        if let Some(&index) = self.acknowledged.iter().next_back()
            && index >= self.total_chunks
        {
            return Err(TransferError::InvalidIndex {
                index,
                total: self.total_chunks,
            });
        }
        Ok(())
    }
}

/// Millisecond timestamp plus a random suffix, e.g. `18c2f4a9b10-3f9a0c1d2e4b`.
fn generate_session_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{millis:x}-{}", &suffix[..12])
}
