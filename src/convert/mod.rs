//! Conversion cascade: turn office documents into PDF before extraction.
//!
//! The remote extractor cannot ingest proprietary office formats, so those
//! files are first converted to PDF by one of several independent strategies,
//! tried in strict priority order:
//!
//! 1. [`pandoc::PandocStrategy`] — a specialized document converter, fast
//!    and dependency-light where it applies
//! 2. [`native::NativeAutomationStrategy`] — drives the natively installed
//!    office application via a generated script (platform-gated)
//! 3. [`soffice::SofficeStrategy`] — LibreOffice headless, the most general
//!    converter, with multiple export-option profiles
//!
//! A strategy's output is only trusted after an independent PDF-validity
//! check; invalid outputs are deleted on the spot and the cascade advances.
//! When every strategy fails the cascade does not fail the file — it returns
//! [`CascadeOutcome::Unconverted`], which tells the orchestrator to attempt
//! direct extraction on the original bytes as a last resort.

pub mod native;
pub mod pandoc;
pub mod soffice;

use crate::config::ExtractionConfig;
use crate::formats::ConversionKind;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Canonical PDF signature bytes.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A failure of one cascade strategy. Never fatal: the cascade recovers by
/// advancing to the next strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The converter binary or platform facility is not present.
    #[error("converter not available: {0}")]
    Unavailable(String),

    /// The conversion process exceeded its wall-clock timeout.
    #[error("conversion timed out after {0}s")]
    TimedOut(u64),

    /// The converter ran but did not produce a usable result.
    #[error("conversion failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One way of producing a PDF from an office document.
///
/// Implementations must leave no temporary files behind on any exit path;
/// the output file itself is the cascade's to validate and, if invalid,
/// delete.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Short name recorded in reports when this strategy succeeds.
    fn name(&self) -> &'static str;

    /// Whether this strategy can handle the given document family.
    fn applicable(&self, kind: ConversionKind) -> bool;

    /// Convert `input` to a PDF under `scratch_dir` and return its path.
    async fn convert(
        &self,
        input: &Path,
        scratch_dir: &Path,
        kind: ConversionKind,
        config: &ExtractionConfig,
    ) -> Result<PathBuf, StrategyError>;
}

/// Terminal result of the cascade.
#[derive(Debug)]
pub enum CascadeOutcome {
    /// A strategy produced a validated PDF.
    Converted {
        path: PathBuf,
        strategy: &'static str,
    },
    /// Every strategy failed; the orchestrator should attempt direct
    /// extraction on the original, unconverted file.
    Unconverted,
}

/// The production strategy order.
pub fn default_strategies() -> Vec<Box<dyn ConversionStrategy>> {
    vec![
        Box::new(pandoc::PandocStrategy),
        Box::new(native::NativeAutomationStrategy),
        Box::new(soffice::SofficeStrategy),
    ]
}

/// Check that `path` holds something worth calling a PDF: it exists, meets
/// the minimum size, and starts with the `%PDF` signature.
///
/// The size floor matters because converters that die mid-write tend to
/// leave a header-only stub behind, which would otherwise pass the signature
/// check.
pub async fn is_valid_pdf(path: &Path, min_bytes: u64) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    if !meta.is_file() || meta.len() < min_bytes {
        return false;
    }
    let Ok(bytes) = tokio::fs::read(path).await else {
        return false;
    };
    bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC
}

/// Run the cascade over `input`, trying each applicable strategy in order.
///
/// Transition rule: advance only when a strategy errors or its output fails
/// validation; stop at the first validated output. Invalid outputs are
/// deleted before advancing, so no orphaned artifacts persist.
pub async fn run_cascade(
    strategies: &[Box<dyn ConversionStrategy>],
    input: &Path,
    scratch_dir: &Path,
    kind: ConversionKind,
    config: &ExtractionConfig,
) -> CascadeOutcome {
    for strategy in strategies {
        if !strategy.applicable(kind) {
            debug!(
                "Strategy '{}' not applicable to {:?}, skipping",
                strategy.name(),
                kind
            );
            continue;
        }

        match strategy.convert(input, scratch_dir, kind, config).await {
            Ok(path) => {
                if is_valid_pdf(&path, config.min_valid_pdf_bytes).await {
                    info!(
                        "Strategy '{}' converted {} successfully",
                        strategy.name(),
                        input.display()
                    );
                    return CascadeOutcome::Converted {
                        path,
                        strategy: strategy.name(),
                    };
                }
                warn!(
                    "Strategy '{}' produced an invalid PDF at {}, deleting",
                    strategy.name(),
                    path.display()
                );
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Could not delete invalid output {}: {}", path.display(), e);
                }
            }
            Err(e) => {
                warn!("Strategy '{}' failed: {}", strategy.name(), e);
            }
        }
    }

    info!(
        "All conversion strategies exhausted for {}; falling back to direct extraction",
        input.display()
    );
    CascadeOutcome::Unconverted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a fixed byte string as its "PDF" output.
    struct FixedOutputStrategy {
        name: &'static str,
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    impl FixedOutputStrategy {
        fn new(name: &'static str, body: &[u8]) -> Self {
            Self {
                name,
                body: body.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConversionStrategy for FixedOutputStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applicable(&self, _: ConversionKind) -> bool {
            true
        }

        async fn convert(
            &self,
            _input: &Path,
            scratch_dir: &Path,
            _kind: ConversionKind,
            _config: &ExtractionConfig,
        ) -> Result<PathBuf, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = scratch_dir.join(format!("{}.pdf", self.name));
            tokio::fs::write(&out, &self.body).await?;
            Ok(out)
        }
    }

    struct ErroringStrategy;

    #[async_trait]
    impl ConversionStrategy for ErroringStrategy {
        fn name(&self) -> &'static str {
            "erroring"
        }

        fn applicable(&self, _: ConversionKind) -> bool {
            true
        }

        async fn convert(
            &self,
            _: &Path,
            _: &Path,
            _: ConversionKind,
            _: &ExtractionConfig,
        ) -> Result<PathBuf, StrategyError> {
            Err(StrategyError::Unavailable("no binary".into()))
        }
    }

    fn valid_pdf_body(config: &ExtractionConfig) -> Vec<u8> {
        let mut body = b"%PDF-1.7\n".to_vec();
        body.resize(config.min_valid_pdf_bytes as usize + 16, b' ');
        body
    }

    #[tokio::test]
    async fn undersized_output_is_deleted_and_cascade_advances() {
        let scratch = TempDir::new().unwrap();
        let config = ExtractionConfig::default();

        let tiny = FixedOutputStrategy::new("tiny", b"%PDF-1.7 but only fifty bytes of content here!!");
        let good = FixedOutputStrategy::new("good", &valid_pdf_body(&config));
        let tiny_out = scratch.path().join("tiny.pdf");

        let strategies: Vec<Box<dyn ConversionStrategy>> = vec![Box::new(tiny), Box::new(good)];
        let outcome = run_cascade(
            &strategies,
            Path::new("input.pptx"),
            scratch.path(),
            ConversionKind::Presentation,
            &config,
        )
        .await;

        match outcome {
            CascadeOutcome::Converted { strategy, path } => {
                assert_eq!(strategy, "good");
                assert!(path.exists());
            }
            CascadeOutcome::Unconverted => panic!("expected second strategy to win"),
        }
        assert!(!tiny_out.exists(), "invalid output must be deleted");
    }

    #[tokio::test]
    async fn wrong_signature_fails_validation() {
        let scratch = TempDir::new().unwrap();
        let config = ExtractionConfig::default();
        let mut body = b"<html>not a pdf</html>".to_vec();
        body.resize(config.min_valid_pdf_bytes as usize + 1, b'x');

        let strategies: Vec<Box<dyn ConversionStrategy>> =
            vec![Box::new(FixedOutputStrategy::new("html", &body))];
        let outcome = run_cascade(
            &strategies,
            Path::new("input.doc"),
            scratch.path(),
            ConversionKind::WordProcessing,
            &config,
        )
        .await;

        assert!(matches!(outcome, CascadeOutcome::Unconverted));
        assert!(!scratch.path().join("html.pdf").exists());
    }

    #[tokio::test]
    async fn all_strategies_failing_leaves_no_files_and_signals_direct_extraction() {
        let scratch = TempDir::new().unwrap();
        let config = ExtractionConfig::default();

        let strategies: Vec<Box<dyn ConversionStrategy>> = vec![
            Box::new(ErroringStrategy),
            Box::new(FixedOutputStrategy::new("stub", b"%PDF")),
        ];
        let outcome = run_cascade(
            &strategies,
            Path::new("input.ppt"),
            scratch.path(),
            ConversionKind::Presentation,
            &config,
        )
        .await;

        assert!(matches!(outcome, CascadeOutcome::Unconverted));
        let mut entries = tokio::fs::read_dir(scratch.path()).await.unwrap();
        assert!(
            entries.next_entry().await.unwrap().is_none(),
            "scratch dir must be clean after total failure"
        );
    }

    #[tokio::test]
    async fn first_valid_strategy_stops_the_cascade() {
        let scratch = TempDir::new().unwrap();
        let config = ExtractionConfig::default();

        struct CountingStrategy {
            inner: FixedOutputStrategy,
            invocations: std::sync::Arc<AtomicUsize>,
        }

        #[async_trait]
        impl ConversionStrategy for CountingStrategy {
            fn name(&self) -> &'static str {
                self.inner.name
            }
            fn applicable(&self, kind: ConversionKind) -> bool {
                self.inner.applicable(kind)
            }
            async fn convert(
                &self,
                input: &Path,
                scratch_dir: &Path,
                kind: ConversionKind,
                config: &ExtractionConfig,
            ) -> Result<PathBuf, StrategyError> {
                self.invocations.fetch_add(1, Ordering::SeqCst);
                self.inner.convert(input, scratch_dir, kind, config).await
            }
        }

        let second_invocations = std::sync::Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Box<dyn ConversionStrategy>> = vec![
            Box::new(FixedOutputStrategy::new("first", &valid_pdf_body(&config))),
            Box::new(CountingStrategy {
                inner: FixedOutputStrategy::new("second", &valid_pdf_body(&config)),
                invocations: std::sync::Arc::clone(&second_invocations),
            }),
        ];

        let outcome = run_cascade(
            &strategies,
            Path::new("input.docx"),
            scratch.path(),
            ConversionKind::WordProcessing,
            &config,
        )
        .await;

        assert!(matches!(
            outcome,
            CascadeOutcome::Converted { strategy: "first", .. }
        ));
        assert_eq!(second_invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inapplicable_strategies_are_skipped() {
        struct WordOnly(FixedOutputStrategy);

        #[async_trait]
        impl ConversionStrategy for WordOnly {
            fn name(&self) -> &'static str {
                self.0.name
            }
            fn applicable(&self, kind: ConversionKind) -> bool {
                kind == ConversionKind::WordProcessing
            }
            async fn convert(
                &self,
                input: &Path,
                scratch_dir: &Path,
                kind: ConversionKind,
                config: &ExtractionConfig,
            ) -> Result<PathBuf, StrategyError> {
                self.0.convert(input, scratch_dir, kind, config).await
            }
        }

        let scratch = TempDir::new().unwrap();
        let config = ExtractionConfig::default();
        let strategies: Vec<Box<dyn ConversionStrategy>> = vec![Box::new(WordOnly(
            FixedOutputStrategy::new("word-only", &valid_pdf_body(&config)),
        ))];

        let outcome = run_cascade(
            &strategies,
            Path::new("deck.pptx"),
            scratch.path(),
            ConversionKind::Presentation,
            &config,
        )
        .await;

        assert!(matches!(outcome, CascadeOutcome::Unconverted));
    }
}
