use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` once the session can no longer change state by itself.
    ///
    /// `Failed` and `Cancelled` are terminal for a run but may be resumed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` while an orchestrator is driving the session.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Finalizing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the reassembled media returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Artifact {
    /// Public URL of the stored media.
    Url(String),
    /// Backend identifier of the stored media.
    Id(String),
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Id(id) => f.write_str(id),
        }
    }
}

/// Progress snapshot of an upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub session_id: String,
    pub status: UploadStatus,
    pub total_chunks: usize,
    pub acknowledged_chunks: usize,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.transferred_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_status_serialization() {
        assert_eq!(
            serde_json::to_string(&UploadStatus::Finalizing).unwrap(),
            "\"finalizing\""
        );
        assert_eq!(
            serde_json::to_string(&UploadStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        let parsed: UploadStatus = serde_json::from_str("\"uploading\"").unwrap();
        assert_eq!(parsed, UploadStatus::Uploading);
    }

    #[test]
    fn upload_status_display_matches_serde() {
        for status in [
            UploadStatus::Pending,
            UploadStatus::Uploading,
            UploadStatus::Finalizing,
            UploadStatus::Completed,
            UploadStatus::Failed,
            UploadStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn terminal_and_active_states() {
        assert!(UploadStatus::Completed.is_terminal());
        assert!(UploadStatus::Failed.is_terminal());
        assert!(!UploadStatus::Pending.is_terminal());
        assert!(UploadStatus::Uploading.is_active());
        assert!(UploadStatus::Finalizing.is_active());
        assert!(!UploadStatus::Cancelled.is_active());
    }

    #[test]
    fn artifact_json_shape() {
        let url = Artifact::Url("https://cdn.example.com/v/1.mp4".into());
        assert_eq!(
            serde_json::to_string(&url).unwrap(),
            r#"{"url":"https://cdn.example.com/v/1.mp4"}"#
        );
        assert_eq!(url.to_string(), "https://cdn.example.com/v/1.mp4");
    }

    #[test]
    fn upload_progress_percentage() {
        let p = UploadProgress {
            session_id: "s1".into(),
            status: UploadStatus::Uploading,
            total_chunks: 4,
            acknowledged_chunks: 2,
            total_bytes: 1000,
            transferred_bytes: 500,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:01:00Z".into(),
            error: String::new(),
        };
        assert!((p.percentage() - 50.0).abs() < f64::EPSILON);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("acknowledgedChunks"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn upload_progress_percentage_zero_total() {
        let p = UploadProgress {
            session_id: "s1".into(),
            status: UploadStatus::Pending,
            total_chunks: 0,
            acknowledged_chunks: 0,
            total_bytes: 0,
            transferred_bytes: 0,
            created_at: String::new(),
            updated_at: String::new(),
            error: String::new(),
        };
        assert_eq!(p.percentage(), 0.0);
    }
}
