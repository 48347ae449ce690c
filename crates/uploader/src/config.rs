//! Upload tuning knobs and the retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use roost_protocol::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT,
};

use crate::error::UploadError;

/// Options recognized by the uploader.
///
/// Every field has a default, so a partial config table is valid. Keys are
/// accepted both in snake_case and in the backend's camelCase spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Bytes per chunk.
    #[serde(default = "default_chunk_size", alias = "chunkSize")]
    pub chunk_size: u64,

    /// Retries per chunk (and for finalization) after the first attempt.
    #[serde(default = "default_max_retries", alias = "maxRetries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles with every further retry.
    #[serde(default = "default_base_delay_ms", alias = "baseDelayMs")]
    pub base_delay_ms: u64,

    /// Backoff cap.
    #[serde(default = "default_max_delay_ms", alias = "maxDelayMs")]
    pub max_delay_ms: u64,

    /// Timeout for a single chunk or finalize call.
    #[serde(default = "default_request_timeout_ms", alias = "requestTimeoutMs")]
    pub request_timeout_ms: u64,

    /// Wall-clock budget for the whole run (unbounded when absent).
    #[serde(
        default,
        alias = "uploadTimeoutMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_timeout_ms: Option<u64>,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY.as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY.as_millis() as u64
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            upload_timeout_ms: None,
        }
    }
}

impl UploadConfig {
    /// Rejects values that would make an upload impossible.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidConfig(
                "chunk_size must be positive".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(UploadError::InvalidConfig(
                "request_timeout_ms must be positive".into(),
            ));
        }
        if self.upload_timeout_ms == Some(0) {
            return Err(UploadError::InvalidConfig(
                "upload_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_ms.map(Duration::from_millis)
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base_delay * 2^retry`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
