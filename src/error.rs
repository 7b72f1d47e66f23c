//! Error types for the doc2text library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: extraction of the file cannot proceed at
//!   all (payload over the absolute size limit, remote extractor not
//!   configured, output artifact unwritable). Returned as `Err(ExtractError)`
//!   from the top-level `extract*` functions.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk failed after all retries
//!   (network blip, rate limiting, malformed response) but the rest of the
//!   document is fine. Stored inside [`crate::report::ChunkOutcome`] so
//!   callers see partial success rather than losing the whole document to one
//!   bad chunk.
//!
//! Conversion-strategy failures never appear here at all: the cascade
//! recovers from them internally by advancing to the next strategy, and even
//! total exhaustion only degrades to direct extraction of the original bytes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc2text library.
///
/// Chunk-level failures use [`ChunkError`] and are stored in
/// [`crate::report::ChunkOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Payload exceeds the absolute maximum the pipeline supports.
    ///
    /// The orchestrator checks this before any chunking work and normally
    /// answers with a placeholder artifact instead of surfacing this error;
    /// it escapes only when [`crate::pipeline::planner::plan_chunks`] is
    /// called directly with an oversize payload.
    #[error("Payload of {size} bytes exceeds the {max}-byte maximum")]
    PayloadTooLarge { size: u64, max: u64 },

    // ── Remote extractor errors ───────────────────────────────────────────
    /// The remote extraction provider is not initialised (missing API key etc.).
    #[error("Remote extractor '{provider}' is not configured.\n{hint}")]
    ExtractorNotConfigured { provider: String, hint: String },

    /// A remote extraction call failed. Classified and retried inside
    /// [`crate::pipeline::retry`]; surfaces here only via chunk details.
    #[error("Remote extraction call failed: {message}")]
    RemoteCallFailed { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output artifact.
    #[error("Failed to write output artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk, finalized after retries are
/// exhausted.
///
/// Stored in [`crate::report::ChunkOutcome`]; the overall extraction
/// always continues — even when every chunk fails the result is an empty
/// text plus a low-success warning, never an error.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// Remote extraction failed after all retry attempts.
    #[error("Chunk {ordinal}: remote extraction failed after {attempts} attempts: {detail}")]
    RemoteFailed {
        ordinal: usize,
        attempts: u32,
        detail: String,
    },

    /// The remote client could not be initialised (missing credential).
    /// Not retried: a missing API key will not appear between attempts.
    #[error("Chunk {ordinal}: extractor not configured: {detail}")]
    NotConfigured { ordinal: usize, detail: String },
}

/// Classification of a remote-call failure used by the retry loop.
///
/// {attempt count, error class} drives the continue / backoff / force-reinit
/// decision in [`crate::pipeline::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network, timeout, or rate-limit flavoured — retry after reinitialising
    /// the shared client handle (the session may be poisoned).
    Transient,
    /// Anything else — retry without touching the client.
    Other,
    /// Missing credential — retrying cannot help.
    NonRetryable,
}

/// Classify a remote-call error message.
///
/// Keyword matching on the message is deliberate: the provider layer funnels
/// heterogeneous HTTP and SDK errors into strings, and the retry loop only
/// needs a coarse transient/permanent split.
pub fn classify_failure(message: &str) -> FailureClass {
    let lower = message.to_lowercase();
    const TRANSIENT_MARKERS: &[&str] = &[
        "timeout",
        "timed out",
        "connection",
        "network",
        "rate limit",
        "rate_limit",
        "429",
        "503",
        "502",
        "reset by peer",
        "temporarily",
        "overloaded",
    ];
    const NON_RETRYABLE_MARKERS: &[&str] =
        &["api key", "not configured", "unauthorized", "401", "403"];

    if NON_RETRYABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureClass::NonRetryable
    } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureClass::Transient
    } else {
        FailureClass::Other
    }
}
