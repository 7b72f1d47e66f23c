//! Chunk planning: decide whether and how a payload is split.
//!
//! The remote extractor hard-caps single-request payloads well above 19MB;
//! [`SINGLE_REQUEST_CEILING`] keeps a safety margin under that limit so
//! base64 expansion and prompt overhead never push a request over. Larger
//! payloads are split into tiered chunk sizes: the bigger the file, the
//! bigger each chunk, bounding the total chunk count (and therefore the
//! number of rate-limited remote calls) for very large documents.
//!
//! Planning is a pure function of the payload size — no I/O, fully
//! deterministic — so every property here is unit-testable.

use crate::error::ExtractError;

/// Absolute maximum payload the pipeline accepts.
pub const MAX_PAYLOAD_BYTES: u64 = 400 * 1024 * 1024;

/// Largest payload sent as a single request.
///
/// Chosen to stay under the remote extractor's per-call limit with margin.
pub const SINGLE_REQUEST_CEILING: u64 = 19 * 1024 * 1024;

const MB: u64 = 1024 * 1024;

/// A planned byte range of the payload, with its position bookkeeping.
///
/// Ordinals are 1-based; `total` is carried on every spec so a chunk can be
/// described to the remote model ("chunk K of N") without extra context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    /// 1-based position of this chunk.
    pub ordinal: usize,
    /// Total number of chunks planned for the payload.
    pub total: usize,
    /// Start byte offset, inclusive.
    pub start: u64,
    /// End byte offset, exclusive.
    pub end: u64,
}

impl ChunkSpec {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A chunk view: a planned range bound to the payload's bytes.
///
/// Ephemeral — borrowed from the payload for the duration of one processor
/// invocation (including its retries).
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub spec: ChunkSpec,
    pub bytes: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Bind a spec to its payload slice.
    pub fn slice(payload: &'a [u8], spec: ChunkSpec) -> Self {
        Self {
            spec,
            bytes: &payload[spec.start as usize..spec.end as usize],
        }
    }
}

/// Per-chunk size tier for a payload of `total_size` bytes.
///
/// Larger files use larger chunks to bound the total request count while
/// every tier stays under [`SINGLE_REQUEST_CEILING`].
fn chunk_size_for(total_size: u64) -> u64 {
    if total_size > 200 * MB {
        10 * MB
    } else if total_size > 100 * MB {
        8 * MB
    } else if total_size > 50 * MB {
        6 * MB
    } else {
        5 * MB
    }
}

/// Plan the ordered chunk ranges for a payload of `total_size` bytes.
///
/// Returns a single whole-payload chunk for anything at or under
/// [`SINGLE_REQUEST_CEILING`], and tier-sized contiguous ranges otherwise.
/// The ranges cover the payload exactly: no gaps, no overlaps.
///
/// # Errors
/// [`ExtractError::PayloadTooLarge`] when `total_size` exceeds
/// [`MAX_PAYLOAD_BYTES`] — checked before any chunking work.
pub fn plan_chunks(total_size: u64) -> Result<Vec<ChunkSpec>, ExtractError> {
    if total_size > MAX_PAYLOAD_BYTES {
        return Err(ExtractError::PayloadTooLarge {
            size: total_size,
            max: MAX_PAYLOAD_BYTES,
        });
    }

    if total_size <= SINGLE_REQUEST_CEILING {
        return Ok(vec![ChunkSpec {
            ordinal: 1,
            total: 1,
            start: 0,
            end: total_size,
        }]);
    }

    let chunk_size = chunk_size_for(total_size);
    let total = total_size.div_ceil(chunk_size) as usize;

    let mut specs = Vec::with_capacity(total);
    let mut start = 0u64;
    for ordinal in 1..=total {
        let end = (start + chunk_size).min(total_size);
        specs.push(ChunkSpec {
            ordinal,
            total,
            start,
            end,
        });
        start = end;
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(specs: &[ChunkSpec], total_size: u64) {
        assert_eq!(specs[0].start, 0);
        assert_eq!(specs.last().unwrap().end, total_size);
        for pair in specs.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap at {pair:?}");
        }
        for (i, s) in specs.iter().enumerate() {
            assert_eq!(s.ordinal, i + 1);
            assert_eq!(s.total, specs.len());
            assert!(!s.is_empty(), "planned chunk {s:?} covers no bytes");
        }
    }

    #[test]
    fn small_payload_is_one_chunk() {
        for size in [0, 1, 5 * MB, SINGLE_REQUEST_CEILING] {
            let specs = plan_chunks(size).unwrap();
            assert_eq!(specs.len(), 1, "size {size}");
            assert_eq!(specs[0].start, 0);
            assert_eq!(specs[0].end, size);
            assert_eq!(specs[0].is_empty(), size == 0);
        }
    }

    #[test]
    fn tier_selection_matches_size() {
        assert_eq!(chunk_size_for(250 * MB), 10 * MB);
        assert_eq!(chunk_size_for(120 * MB), 8 * MB);
        assert_eq!(chunk_size_for(60 * MB), 6 * MB);
        assert_eq!(chunk_size_for(30 * MB), 5 * MB);
    }

    #[test]
    fn large_payloads_cover_exactly_with_bounded_chunks() {
        for size in [
            SINGLE_REQUEST_CEILING + 1,
            30 * MB,
            60 * MB,
            120 * MB,
            250 * MB,
            MAX_PAYLOAD_BYTES,
        ] {
            let specs = plan_chunks(size).unwrap();
            assert!(specs.len() > 1, "size {size}");
            assert_exact_cover(&specs, size);
            let bound = chunk_size_for(size);
            for s in &specs {
                assert!(s.len() <= bound, "chunk {s:?} over tier bound {bound}");
            }
        }
    }

    #[test]
    fn oversize_rejected_before_planning() {
        let err = plan_chunks(MAX_PAYLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, ExtractError::PayloadTooLarge { .. }));
    }

    #[test]
    fn chunk_count_stays_bounded_for_max_payload() {
        let specs = plan_chunks(MAX_PAYLOAD_BYTES).unwrap();
        assert_eq!(specs.len(), 40); // 400MB / 10MB tier
    }

    #[test]
    fn slice_binds_spec_to_payload_bytes() {
        let payload: Vec<u8> = (0..100u8).collect();
        let spec = ChunkSpec {
            ordinal: 1,
            total: 2,
            start: 10,
            end: 20,
        };
        let chunk = Chunk::slice(&payload, spec);
        assert_eq!(chunk.bytes, &payload[10..20]);
    }
}
