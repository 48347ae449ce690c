//! Resumable chunked upload orchestration.
//!
//! [`Uploader`] drives an [`UploadSession`](roost_transfer::UploadSession)
//! through an [`UploadTransport`](roost_upload_client::UploadTransport),
//! retrying transient failures and persisting progress so an interrupted
//! upload can continue where it stopped.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use config::{RetryPolicy, UploadConfig};
pub use error::UploadError;
pub use orchestrator::Uploader;
pub use types::UploadEvent;
