use std::time::Duration;

/// Endpoint receiving a single chunk as a multipart form.
pub const CHUNK_ENDPOINT: &str = "/upload-video-chunk";

/// Endpoint asking the backend to reassemble stored chunks.
pub const COMPLETE_ENDPOINT: &str = "/complete-upload";

/// Default chunk size: 5 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of retries per chunk (and for the finalize call).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Backoff cap.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(60_000);

/// Timeout for a single chunk or finalize request.
///
/// Chunks are several MiB and mobile uplinks can be slow, so this is
/// deliberately generous compared to a plain JSON request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Multipart field names used by [`CHUNK_ENDPOINT`].
pub mod fields {
    pub const CHUNK: &str = "chunk";
    pub const INDEX: &str = "index";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const VIDEO_ID: &str = "videoId";
    pub const SESSION_ID: &str = "sessionId";
    pub const CHECKSUM: &str = "checksum";
}
