//! # doc2text
//!
//! Extract plain text from arbitrary documents using a remote LLM extractor.
//!
//! ## Why this crate?
//!
//! Format-specific parsers cover the formats their authors thought of and
//! fail on everything else. This crate takes the opposite bet: anything that
//! is not already plain text is handed to a remote model that reads documents
//! the way a human would, after local preprocessing squeezes the most out of
//! each request — office formats are first converted to PDF by a cascade of
//! local converters, and large payloads are split into size-tiered chunks
//! processed in rate-limited concurrent batches.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Route    extension → direct decode | conversion | remote as-is
//!  ├─ 2. Convert  pandoc → native automation → soffice (validated PDF)
//!  ├─ 3. Plan     size-tiered chunk boundaries (pure math, no I/O)
//!  ├─ 4. Extract  batched remote calls with retry + backoff + reinit
//!  ├─ 5. Assemble ordinal-ordered reassembly + normalization
//!  └─ 6. Artifact exactly one {stem}_{timestamp}.txt per file
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2text::{extract_file, ExtractionConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let output = extract_file(Path::new("report.pdf"), Path::new("out"), &config).await?;
//!     println!("{}", output.text);
//!     eprintln!(
//!         "{}/{} chunks ok, artifact at {}",
//!         output.report.succeeded,
//!         output.report.total_chunks,
//!         output.artifact_path.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2text` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! doc2text = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod formats;
pub mod pipeline;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PhraseRule};
pub use error::{ChunkError, ExtractError};
pub use extract::{extract_all, extract_bytes, extract_file, extract_sync};
pub use report::{ArtifactKind, ChunkOutcome, ExtractionOutput, ExtractionReport};
