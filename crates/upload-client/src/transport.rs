//! Transport trait and error type.
//!
//! The orchestrator talks to the backend only through [`UploadTransport`],
//! which keeps retry policy testable against in-memory mocks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use roost_protocol::{Artifact, ChunkAck};
use roost_transfer::Chunk;

/// Boxed future returned by [`UploadTransport`] methods.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// One network exchange per call, no retries, no state between calls.
pub trait UploadTransport: Send + Sync {
    /// Uploads a single chunk together with its session metadata.
    fn send_chunk<'a>(
        &'a self,
        session_id: &'a str,
        total_chunks: usize,
        chunk: &'a Chunk,
    ) -> TransportFuture<'a, ChunkAck>;

    /// Asks the backend to reassemble every stored chunk of the session.
    fn finalize<'a>(&'a self, session_id: &'a str) -> TransportFuture<'a, Artifact>;
}

/// Failure category of a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection problems, transient server errors, garbled responses.
    NetworkFailure,
    /// The call did not finish within its timeout.
    Timeout,
    /// The server refused the request permanently (e.g. unknown session).
    ServerRejected,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NetworkFailure => "network failure",
            Self::Timeout => "timeout",
            Self::ServerRejected => "server rejected",
        })
    }
}

/// Error returned by a transport call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NetworkFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ServerRejected, message)
    }

    /// Network failures and timeouts are worth retrying; rejections are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::ServerRejected)
    }
}

/// Maps a non-2xx HTTP status to an error kind.
///
/// Request timeouts, rate limiting and 5xx responses are transient; every
/// other 4xx means the request itself is wrong and resending cannot help.
pub fn classify_status(status: u16) -> TransportErrorKind {
    match status {
        408 | 429 => TransportErrorKind::NetworkFailure,
        400..=499 => TransportErrorKind::ServerRejected,
        _ => TransportErrorKind::NetworkFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(TransportError::network("reset").is_retryable());
        assert!(TransportError::timeout("slow").is_retryable());
        assert!(!TransportError::rejected("bad session").is_retryable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = TransportError::rejected("HTTP 404: unknown video");
        assert_eq!(err.to_string(), "server rejected: HTTP 404: unknown video");
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(400), TransportErrorKind::ServerRejected);
        assert_eq!(classify_status(401), TransportErrorKind::ServerRejected);
        assert_eq!(classify_status(404), TransportErrorKind::ServerRejected);
        assert_eq!(classify_status(413), TransportErrorKind::ServerRejected);
        assert_eq!(classify_status(408), TransportErrorKind::NetworkFailure);
        assert_eq!(classify_status(429), TransportErrorKind::NetworkFailure);
        assert_eq!(classify_status(500), TransportErrorKind::NetworkFailure);
        assert_eq!(classify_status(503), TransportErrorKind::NetworkFailure);
    }
}
