use serde::{Deserialize, Serialize};

use crate::types::Artifact;

// ---------------------------------------------------------------------------
// Chunk upload
// ---------------------------------------------------------------------------

/// Body of a 2xx response to a chunk upload.
///
/// The backend echoes the stored index; extra fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

/// Asks the backend to reassemble all stored chunks of a session.
///
/// Older backends key uploads by `videoId`, newer ones by `sessionId`;
/// both carry the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub video_id: String,
    pub session_id: String,
}

impl CompleteUploadRequest {
    pub fn new(session_id: &str) -> Self {
        Self {
            video_id: session_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

/// Body of a 2xx response to [`CompleteUploadRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

impl CompleteUploadResponse {
    /// Returns the artifact reference, preferring the URL when both are set.
    pub fn into_artifact(self) -> Option<Artifact> {
        match (self.artifact_url, self.artifact_id) {
            (Some(url), _) if !url.is_empty() => Some(Artifact::Url(url)),
            (_, Some(id)) if !id.is_empty() => Some(Artifact::Id(id)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body the backend may attach to a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Extracts a human-readable message from a raw response body.
    ///
    /// Falls back to the trimmed body text when it is not a JSON error object.
    pub fn message_from_body(body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body)
            && let Some(msg) = parsed.error.or(parsed.message)
        {
            return msg;
        }
        body.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ack_ignores_extra_fields() {
        let ack: ChunkAck = serde_json::from_str(r#"{"index":2,"stored":true}"#).unwrap();
        assert_eq!(ack.index, 2);
    }

    #[test]
    fn complete_request_field_names() {
        let req = CompleteUploadRequest::new("abc-123");
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"videoId":"abc-123","sessionId":"abc-123"}"#);
    }

    #[test]
    fn complete_response_prefers_url() {
        let resp: CompleteUploadResponse = serde_json::from_str(
            r#"{"artifactUrl":"https://cdn.example.com/a.mp4","artifactId":"a"}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_artifact(),
            Some(Artifact::Url("https://cdn.example.com/a.mp4".into()))
        );
    }

    #[test]
    fn complete_response_id_only() {
        let resp: CompleteUploadResponse =
            serde_json::from_str(r#"{"artifactId":"vid_42"}"#).unwrap();
        assert_eq!(resp.into_artifact(), Some(Artifact::Id("vid_42".into())));
    }

    #[test]
    fn complete_response_empty_has_no_artifact() {
        let resp: CompleteUploadResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.into_artifact(), None);

        let resp: CompleteUploadResponse =
            serde_json::from_str(r#"{"artifactUrl":""}"#).unwrap();
        assert_eq!(resp.into_artifact(), None);
    }

    #[test]
    fn error_message_from_json_body() {
        assert_eq!(
            ErrorResponse::message_from_body(r#"{"error":"unknown video"}"#),
            "unknown video"
        );
        assert_eq!(
            ErrorResponse::message_from_body(r#"{"message":"too large"}"#),
            "too large"
        );
    }

    #[test]
    fn error_message_from_plain_body() {
        assert_eq!(
            ErrorResponse::message_from_body("  Bad Gateway \n"),
            "Bad Gateway"
        );
        assert_eq!(ErrorResponse::message_from_body(r#"{"other":1}"#), r#"{"other":1}"#);
    }
}
