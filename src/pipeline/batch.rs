//! Batch scheduling: bounded-concurrency fan-out over planned chunks.
//!
//! Chunks are processed in fixed-width batches. Within a batch every chunk
//! runs concurrently and the batch completes only when all of its members
//! have a terminal outcome, success or failure. Between batches (never after
//! the last) the scheduler sleeps a fixed delay so the sustained request rate
//! respects the remote service's limits.
//!
//! Because [`crate::pipeline::retry::process_chunk`] never returns an error,
//! a failing chunk cannot abort its batch, and a failing batch cannot abort
//! the ones after it — processing always continues through every planned
//! chunk.

use crate::config::ExtractionConfig;
use crate::pipeline::planner::{Chunk, ChunkSpec};
use crate::pipeline::remote::ChunkExtractor;
use crate::pipeline::retry::process_chunk;
use crate::report::ChunkOutcome;
use futures::future::join_all;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Run every planned chunk through the retrying processor and collect all
/// outcomes, ordered by ordinal.
pub async fn run_batches<E>(
    extractor: &E,
    payload: &[u8],
    specs: &[ChunkSpec],
    mime_hint: &str,
    config: &ExtractionConfig,
) -> Vec<ChunkOutcome>
where
    E: ChunkExtractor + ?Sized,
{
    let total = specs.len();
    let batch_count = total.div_ceil(config.batch_width.max(1));
    let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(total);
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (batch_idx, batch) in specs.chunks(config.batch_width.max(1)).enumerate() {
        if batch_idx > 0 {
            sleep(Duration::from_secs(config.inter_batch_delay_secs)).await;
        }

        let batch_outcomes = join_all(batch.iter().map(|spec| {
            let chunk = Chunk::slice(payload, *spec);
            process_chunk(extractor, chunk, mime_hint, config)
        }))
        .await;

        for outcome in &batch_outcomes {
            if outcome.succeeded {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }
        outcomes.extend(batch_outcomes);

        info!(
            "Batch {}/{} complete: {}/{} chunks processed ({} ok, {} failed)",
            batch_idx + 1,
            batch_count,
            outcomes.len(),
            total,
            succeeded,
            failed
        );
    }

    // Completion order within a batch is unspecified; the contract is
    // ordinal order.
    outcomes.sort_by_key(|o| o.ordinal);
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::pipeline::planner::plan_chunks;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Echoes the chunk ordinal after a simulated 1s network call.
    struct SlowEchoExtractor;

    #[async_trait]
    impl ChunkExtractor for SlowEchoExtractor {
        async fn extract(&self, chunk: &Chunk<'_>, _: &str) -> Result<String, ExtractError> {
            sleep(Duration::from_secs(1)).await;
            Ok(format!("chunk-{}", chunk.spec.ordinal))
        }

        async fn reset(&self) {}
    }

    /// Fails a fixed ordinal permanently; everything else succeeds.
    struct OrdinalFailExtractor {
        bad_ordinal: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChunkExtractor for OrdinalFailExtractor {
        async fn extract(&self, chunk: &Chunk<'_>, _: &str) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if chunk.spec.ordinal == self.bad_ordinal {
                Err(ExtractError::Internal("persistent failure".into()))
            } else {
                Ok(format!("chunk-{}", chunk.spec.ordinal))
            }
        }

        async fn reset(&self) {}
    }

    fn specs_for(n: usize) -> Vec<ChunkSpec> {
        (1..=n)
            .map(|ordinal| ChunkSpec {
                ordinal,
                total: n,
                start: (ordinal as u64 - 1) * 4,
                end: ordinal as u64 * 4,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn batches_run_concurrently_with_inter_batch_delay() {
        let payload = vec![0u8; 24];
        let specs = specs_for(6);
        let config = ExtractionConfig::default(); // width 3, delay 2s

        let start = Instant::now();
        let outcomes = run_batches(&SlowEchoExtractor, &payload, &specs, "x", &config).await;
        let elapsed = start.elapsed();

        // Two batches of three 1s calls plus one 2s delay: 1 + 2 + 1 = 4s.
        // A sequential run would need 6s; no trailing delay after the last batch.
        assert_eq!(elapsed, Duration::from_secs(4));
        assert_eq!(outcomes.len(), 6);
        for (i, o) in outcomes.iter().enumerate() {
            assert_eq!(o.ordinal, i + 1);
            assert_eq!(o.text, format!("chunk-{}", i + 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_chunk_never_blocks_later_batches() {
        let payload = vec![0u8; 20];
        let specs = specs_for(5);
        let config = ExtractionConfig::default();
        let extractor = OrdinalFailExtractor {
            bad_ordinal: 2,
            calls: AtomicUsize::new(0),
        };

        let outcomes = run_batches(&extractor, &payload, &specs, "x", &config).await;

        assert_eq!(outcomes.len(), 5);
        assert!(!outcomes[1].succeeded);
        assert!(outcomes.iter().filter(|o| o.succeeded).count() == 4);
        // The bad chunk consumed its 3 attempts; the other 4 one each.
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn planned_specs_from_planner_feed_through() {
        // Small payload: single chunk, single batch, no delay.
        let payload = vec![7u8; 128];
        let specs = plan_chunks(payload.len() as u64).unwrap();
        let config = ExtractionConfig::default();

        let start = Instant::now();
        let outcomes = run_batches(&SlowEchoExtractor, &payload, &specs, "x", &config).await;

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded);
    }
}
