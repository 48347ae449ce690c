//! HTTP binding of [`UploadTransport`].
//!
//! Async client using `reqwest`: chunks go out as multipart forms, the
//! finalize call as JSON.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::{debug, trace};

use roost_protocol::constants::{CHUNK_ENDPOINT, COMPLETE_ENDPOINT, DEFAULT_REQUEST_TIMEOUT, fields};
use roost_protocol::{
    Artifact, ChunkAck, CompleteUploadRequest, CompleteUploadResponse, ErrorResponse,
};
use roost_transfer::Chunk;

use crate::transport::{TransportError, TransportFuture, UploadTransport, classify_status};

/// Errors raised while building an [`HttpTransport`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Explicit configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Backend root, e.g. `https://api.example.com`.
    pub base_url: String,
    pub chunk_path: String,
    pub complete_path: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub auth_token: Option<String>,
    /// Extra headers attached to every request.
    pub headers: Vec<(String, String)>,
    /// Upper bound for a single request, including the body upload.
    pub request_timeout: Duration,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            chunk_path: CHUNK_ENDPOINT.to_string(),
            complete_path: COMPLETE_ENDPOINT.to_string(),
            auth_token: None,
            headers: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Upload transport speaking the chunk / complete-upload HTTP API.
pub struct HttpTransport {
    http: reqwest::Client,
    chunk_url: String,
    complete_url: String,
}

impl HttpTransport {
    /// Builds a transport from `config`.
    pub fn new(config: TransportConfig) -> Result<Self, ClientError> {
        let base = config.base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(config.base_url.clone()));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ClientError::InvalidHeader("authorization".into()))?,
            );
        }
        for (name, value) in &config.headers {
            let name_h = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            let value_h =
                HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            headers.insert(name_h, value_h);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            chunk_url: format!("{base}{}", config.chunk_path),
            complete_url: format!("{base}{}", config.complete_path),
        })
    }

    async fn post_chunk(
        &self,
        session_id: &str,
        total_chunks: usize,
        chunk: &Chunk,
    ) -> Result<ChunkAck, TransportError> {
        // Shares the chunk buffer.
        let body = reqwest::Body::from(chunk.data.clone());
        let part = Part::stream_with_length(body, chunk.len() as u64)
            .file_name(format!("chunk-{}", chunk.index))
            .mime_str("application/octet-stream")
            .map_err(from_reqwest)?;
        let form = Form::new()
            .part(fields::CHUNK, part)
            .text(fields::INDEX, chunk.index.to_string())
            .text(fields::TOTAL_CHUNKS, total_chunks.to_string())
            .text(fields::VIDEO_ID, session_id.to_string())
            .text(fields::SESSION_ID, session_id.to_string())
            .text(fields::CHECKSUM, chunk.checksum.clone());

        trace!(session = %session_id, index = chunk.index, bytes = chunk.len(), "posting chunk");
        let resp = self
            .http
            .post(&self.chunk_url)
            .multipart(form)
            .send()
            .await
            .map_err(from_reqwest)?;
        let body = read_success(resp).await?;

        let ack: ChunkAck = serde_json::from_slice(&body)
            .map_err(|e| TransportError::network(format!("invalid chunk acknowledgment: {e}")))?;
        if ack.index != chunk.index {
            return Err(TransportError::rejected(format!(
                "backend acknowledged chunk {} but {} was sent",
                ack.index, chunk.index
            )));
        }
        Ok(ack)
    }

    async fn post_complete(&self, session_id: &str) -> Result<Artifact, TransportError> {
        let req = CompleteUploadRequest::new(session_id);
        let resp = self
            .http
            .post(&self.complete_url)
            .json(&req)
            .send()
            .await
            .map_err(from_reqwest)?;
        let body = read_success(resp).await?;

        let complete: CompleteUploadResponse = serde_json::from_slice(&body)
            .map_err(|e| TransportError::network(format!("invalid complete-upload response: {e}")))?;
        let artifact = complete.into_artifact().ok_or_else(|| {
            TransportError::network("complete-upload response carries no artifact reference")
        })?;
        debug!(session = %session_id, artifact = %artifact, "upload finalized");
        Ok(artifact)
    }
}

impl UploadTransport for HttpTransport {
    fn send_chunk<'a>(
        &'a self,
        session_id: &'a str,
        total_chunks: usize,
        chunk: &'a Chunk,
    ) -> TransportFuture<'a, ChunkAck> {
        Box::pin(self.post_chunk(session_id, total_chunks, chunk))
    }

    fn finalize<'a>(&'a self, session_id: &'a str) -> TransportFuture<'a, Artifact> {
        Box::pin(self.post_complete(session_id))
    }
}

/// Returns the body of a 2xx response or a classified error.
async fn read_success(resp: reqwest::Response) -> Result<Vec<u8>, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = ErrorResponse::message_from_body(&body);
        return Err(TransportError::new(
            classify_status(status.as_u16()),
            format!("HTTP {}: {message}", status.as_u16()),
        ));
    }
    Ok(resp.bytes().await.map_err(from_reqwest)?.to_vec())
}

fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(e.to_string())
    } else {
        TransportError::network(e.to_string())
    }
}
