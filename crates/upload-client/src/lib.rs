//! Transport layer for chunked media uploads.
//!
//! [`UploadTransport`] is the seam the orchestrator depends on;
//! [`HttpTransport`] binds it to the backend's HTTP endpoints.

pub mod http;
pub mod transport;

pub use http::{ClientError, HttpTransport, TransportConfig};
pub use transport::{
    TransportError, TransportErrorKind, TransportFuture, UploadTransport, classify_status,
};
