//! Per-chunk retry policy: bounded attempts, exponential backoff, and
//! client reinitialisation on suspected connection poisoning.
//!
//! ## Retry strategy
//!
//! Rate-limit and overload errors are frequent under concurrent load and
//! almost always clear within seconds. The wait before retry `n` is
//! `backoff_base_secs * 2^(n-1)` — 2s then 4s with defaults — so a batch of
//! retrying chunks never hammers a recovering endpoint in lockstep.
//!
//! When the failure looks like a network/timeout/rate-limit condition, the
//! shared client handle is reset before the next attempt: a poisoned
//! connection or session would otherwise fail every subsequent attempt the
//! same way.
//!
//! [`process_chunk`] never returns an error. Exhausting retries finalizes a
//! `succeeded=false` outcome; this is the only place chunk-level failure
//! becomes terminal, so one dead chunk can never abort its batch.

use crate::config::ExtractionConfig;
use crate::error::{classify_failure, ChunkError, FailureClass};
use crate::pipeline::planner::Chunk;
use crate::pipeline::remote::ChunkExtractor;
use crate::report::ChunkOutcome;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Process one chunk to a terminal [`ChunkOutcome`].
pub async fn process_chunk<E>(
    extractor: &E,
    chunk: Chunk<'_>,
    mime_hint: &str,
    config: &ExtractionConfig,
) -> ChunkOutcome
where
    E: ChunkExtractor + ?Sized,
{
    let start = Instant::now();
    let ordinal = chunk.spec.ordinal;
    let mut last_err: Option<String> = None;

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            let backoff = config.backoff_base_secs * 2u64.pow(attempt - 2);
            warn!(
                "Chunk {}: retry {}/{} after {}s",
                ordinal, attempt, config.max_attempts, backoff
            );
            sleep(Duration::from_secs(backoff)).await;
        }

        match extractor.extract(&chunk, mime_hint).await {
            Ok(text) => {
                return ChunkOutcome::success(
                    ordinal,
                    text,
                    attempt - 1,
                    start.elapsed().as_millis() as u64,
                );
            }
            Err(e) => {
                let msg = format!("{e}");
                warn!("Chunk {}: attempt {} failed — {}", ordinal, attempt, msg);

                match classify_failure(&msg) {
                    FailureClass::NonRetryable => {
                        return ChunkOutcome::failure(
                            ordinal,
                            ChunkError::NotConfigured {
                                ordinal,
                                detail: msg,
                            },
                            attempt - 1,
                            start.elapsed().as_millis() as u64,
                        );
                    }
                    FailureClass::Transient => {
                        // A stale connection would fail the next attempt
                        // identically; force a fresh client first.
                        if attempt < config.max_attempts {
                            extractor.reset().await;
                        }
                        last_err = Some(msg);
                    }
                    FailureClass::Other => {
                        last_err = Some(msg);
                    }
                }
            }
        }
    }

    let detail = last_err.unwrap_or_else(|| "unknown error".to_string());
    ChunkOutcome::failure(
        ordinal,
        ChunkError::RemoteFailed {
            ordinal,
            attempts: config.max_attempts,
            detail,
        },
        config.max_attempts - 1,
        start.elapsed().as_millis() as u64,
    )
}
