//! Result and report types produced by the extraction pipeline.
//!
//! Everything here is write-once: a [`ChunkOutcome`] is finalized exactly
//! once per chunk (after retries are exhausted) and never re-evaluated, and
//! an [`ExtractionReport`] is derived from the finished outcome set. Callers
//! inspecting a report can therefore trust it matches the artifact on disk.

use crate::error::ChunkError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overall success rate below which the report carries an incompleteness
/// warning. Extraction is still returned, just visibly flagged.
pub const LOW_SUCCESS_WARNING_THRESHOLD: f64 = 50.0;

/// The terminal result of processing one chunk.
///
/// There is exactly one outcome per ordinal: no duplicates, no gaps. A failed
/// chunk contributes an empty `text` and its last error reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOutcome {
    /// 1-based position of the chunk in the original payload.
    pub ordinal: usize,
    /// Whether any attempt produced text.
    pub succeeded: bool,
    /// Extracted text, empty on failure.
    pub text: String,
    /// Last error after exhausting retries, if the chunk failed.
    pub error: Option<ChunkError>,
    /// Number of retries consumed (0 = first attempt succeeded).
    pub retries: u32,
    /// Wall-clock time spent on this chunk, including backoff sleeps.
    pub duration_ms: u64,
}

impl ChunkOutcome {
    /// Finalize a successful chunk.
    pub fn success(ordinal: usize, text: String, retries: u32, duration_ms: u64) -> Self {
        Self {
            ordinal,
            succeeded: true,
            text,
            error: None,
            retries,
            duration_ms,
        }
    }

    /// Finalize a failed chunk. The only place chunk-level failure becomes
    /// terminal.
    pub fn failure(ordinal: usize, error: ChunkError, retries: u32, duration_ms: u64) -> Self {
        Self {
            ordinal,
            succeeded: false,
            text: String::new(),
            error: Some(error),
            retries,
            duration_ms,
        }
    }
}

/// Aggregate statistics for one file's extraction, attached to the final
/// result and serialised into `--json` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Chunks planned for this payload.
    pub total_chunks: usize,
    /// Chunks that produced text.
    pub succeeded: usize,
    /// Chunks finalized as failed.
    pub failed: usize,
    /// `succeeded / total_chunks × 100`, 100.0 for an empty chunk set.
    pub success_rate_percent: f64,
    /// End-to-end wall-clock time for the file.
    pub elapsed_secs: f64,
    /// Present when the success rate falls below
    /// [`LOW_SUCCESS_WARNING_THRESHOLD`] or the file was processed in
    /// degraded mode (conversion cascade exhausted).
    pub warning: Option<String>,
    /// Per-chunk details, ordered by ordinal.
    pub chunks: Vec<ChunkOutcome>,
}

impl ExtractionReport {
    /// A report for paths that never touch the chunk pipeline (direct text
    /// reads, oversize placeholders).
    pub fn without_chunks(elapsed_secs: f64) -> Self {
        Self {
            total_chunks: 0,
            succeeded: 0,
            failed: 0,
            success_rate_percent: 100.0,
            elapsed_secs,
            warning: None,
            chunks: Vec::new(),
        }
    }
}

/// Which of the three artifact forms was written for a file.
///
/// Every processed file produces exactly one artifact of exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Text extracted through the remote pipeline (possibly after conversion).
    Extracted,
    /// Text decoded directly from a text-native file, no remote calls.
    DirectText,
    /// Metadata-only placeholder for a payload over the absolute size limit.
    OversizePlaceholder,
}

/// Complete result of extracting one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The (normalized) extracted text, or the placeholder body.
    pub text: String,
    /// Where the artifact was written.
    pub artifact_path: PathBuf,
    /// Which artifact form this is.
    pub kind: ArtifactKind,
    /// Name of the conversion strategy that succeeded, if conversion ran.
    pub conversion_strategy: Option<String>,
    /// True when the cascade was exhausted and the original, unconverted
    /// bytes were sent to the remote extractor as a last resort.
    pub degraded: bool,
    /// Per-chunk statistics.
    pub report: ExtractionReport,
}
