//! Pipeline stages for chunked remote text extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations (e.g. a different remote provider) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! planner ──▶ batch ──▶ retry ──▶ remote ──▶ assemble
//! (ranges)   (fan-out)  (backoff)  (network)   (order + cleanup)
//! ```
//!
//! 1. [`planner`]  — pure chunk-boundary math over the payload size
//! 2. [`batch`]    — bounded-concurrency batches with inter-batch delays
//! 3. [`retry`]    — bounded attempts, exponential backoff, client reinit
//! 4. [`remote`]   — the provider call; the only stage with network I/O
//! 5. [`assemble`] — ordinal-ordered reassembly, statistics, normalization

pub mod assemble;
pub mod batch;
pub mod planner;
pub mod remote;
pub mod retry;
