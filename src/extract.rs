//! Extraction orchestrator: one entry point per file, one artifact per file.
//!
//! The orchestrator owns the per-file decision policy and nothing else:
//!
//! 1. Payload over the absolute size limit → metadata placeholder artifact,
//!    no remote calls.
//! 2. Text-native file → direct local decode plus normalization, no remote
//!    calls.
//! 3. Office format → conversion cascade, then the chunked remote pipeline
//!    on the converted PDF. If the cascade is exhausted, the original bytes
//!    go to the remote extractor anyway, flagged as degraded.
//! 4. Everything else (PDF, images, unknown) → chunked remote pipeline.
//!
//! Every processed file ends with exactly one `.txt` artifact on disk: the
//! extracted text, the oversize placeholder, or (on a fatal error) a
//! best-effort error note. The artifact name is `{stem}_{unix_seconds}.txt`
//! so repeated runs never clobber earlier results.

use crate::config::ExtractionConfig;
use crate::convert::{default_strategies, run_cascade, CascadeOutcome, ConversionStrategy};
use crate::error::ExtractError;
use crate::formats::{classify_extension, mime_hint, FileKind};
use crate::pipeline::assemble::{assemble, normalize_text};
use crate::pipeline::batch::run_batches;
use crate::pipeline::planner::{plan_chunks, MAX_PAYLOAD_BYTES};
use crate::pipeline::remote::{ChunkExtractor, RemoteExtractor};
use crate::report::{ArtifactKind, ExtractionOutput, ExtractionReport};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tracing::{info, warn};

/// Extract one file, writing its artifact under `out_dir`.
///
/// Fatal errors (unreadable input, unconfigured extractor, unwritable
/// output) return `Err`; per-chunk failures do not — they are folded into
/// the report and, below a 50% success rate, into its warning.
pub async fn extract_file(
    input: &Path,
    out_dir: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let started = Instant::now();
    let strategies = default_strategies();
    let extractor = RemoteExtractor::new(config);

    let result =
        extract_file_inner(input, out_dir, config, &strategies, &extractor, started).await;

    if let Err(ref e) = result {
        // Best-effort error artifact so every processed file leaves a trace.
        write_error_artifact(input, out_dir, e).await;
    }
    result
}

/// The decision policy, with the cascade strategies and the remote extractor
/// injected. [`extract_file`] supplies the production set; tests supply
/// doubles.
async fn extract_file_inner(
    input: &Path,
    out_dir: &Path,
    config: &ExtractionConfig,
    strategies: &[Box<dyn ConversionStrategy>],
    extractor: &dyn ChunkExtractor,
    started: Instant,
) -> Result<ExtractionOutput, ExtractError> {
    let meta = tokio::fs::metadata(input)
        .await
        .map_err(|e| io_to_extract_error(e, input))?;
    let size = meta.len();

    // Size gate first: the placeholder path must not read the payload.
    if size > MAX_PAYLOAD_BYTES {
        warn!(
            "{} is {} bytes, over the {}-byte limit; writing placeholder",
            input.display(),
            size,
            MAX_PAYLOAD_BYTES
        );
        let body = placeholder_body(input, size);
        let path = write_artifact(input, out_dir, &body).await?;
        return Ok(ExtractionOutput {
            text: body,
            artifact_path: path,
            kind: ArtifactKind::OversizePlaceholder,
            conversion_strategy: None,
            degraded: false,
            report: ExtractionReport::without_chunks(started.elapsed().as_secs_f64()),
        });
    }

    let ext = extension_of(input);

    match classify_extension(&ext) {
        FileKind::TextNative => {
            let bytes = tokio::fs::read(input)
                .await
                .map_err(|e| io_to_extract_error(e, input))?;
            let decoded = String::from_utf8_lossy(&bytes);
            let text = normalize_text(&decoded, &config.phrase_rules);
            let path = write_artifact(input, out_dir, &text).await?;
            info!("{}: decoded directly, no remote calls", input.display());
            return Ok(ExtractionOutput {
                text,
                artifact_path: path,
                kind: ArtifactKind::DirectText,
                conversion_strategy: None,
                degraded: false,
                report: ExtractionReport::without_chunks(started.elapsed().as_secs_f64()),
            });
        }

        FileKind::NeedsConversion(kind) => {
            let scratch = TempDir::new().map_err(|e| {
                ExtractError::Internal(format!("could not create scratch directory: {e}"))
            })?;

            match run_cascade(strategies, input, scratch.path(), kind, config).await {
                CascadeOutcome::Converted { path, strategy } => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .map_err(|e| io_to_extract_error(e, &path))?;
                    let (text, report) =
                        remote_extract(extractor, &bytes, "application/pdf", config, started)
                            .await?;
                    let artifact = write_artifact(input, out_dir, &text).await?;
                    Ok(ExtractionOutput {
                        text,
                        artifact_path: artifact,
                        kind: ArtifactKind::Extracted,
                        conversion_strategy: Some(strategy.to_string()),
                        degraded: false,
                        report,
                    })
                }
                CascadeOutcome::Unconverted => {
                    // Last resort: the remote extractor sees the raw office
                    // bytes. Quality suffers, so the run is flagged.
                    let bytes = tokio::fs::read(input)
                        .await
                        .map_err(|e| io_to_extract_error(e, input))?;
                    let (text, mut report) =
                        remote_extract(extractor, &bytes, mime_hint(&ext), config, started)
                            .await?;
                    let note =
                        "Conversion failed; text was extracted from the unconverted original."
                            .to_string();
                    report.warning = Some(match report.warning.take() {
                        Some(existing) => format!("{existing}\n{note}"),
                        None => note,
                    });
                    let artifact = write_artifact(input, out_dir, &text).await?;
                    Ok(ExtractionOutput {
                        text,
                        artifact_path: artifact,
                        kind: ArtifactKind::Extracted,
                        conversion_strategy: None,
                        degraded: true,
                        report,
                    })
                }
            }
        }

        FileKind::Remote => {
            let bytes = tokio::fs::read(input)
                .await
                .map_err(|e| io_to_extract_error(e, input))?;
            let (text, report) =
                remote_extract(extractor, &bytes, mime_hint(&ext), config, started).await?;
            let artifact = write_artifact(input, out_dir, &text).await?;
            Ok(ExtractionOutput {
                text,
                artifact_path: artifact,
                kind: ArtifactKind::Extracted,
                conversion_strategy: None,
                degraded: false,
                report,
            })
        }
    }
}

/// Extract raw bytes through the chunked remote pipeline. No artifact is
/// written; callers that hold bytes rather than files get text and a report.
pub async fn extract_bytes(
    bytes: &[u8],
    mime: &str,
    config: &ExtractionConfig,
) -> Result<(String, ExtractionReport), ExtractError> {
    let extractor = RemoteExtractor::new(config);
    remote_extract(&extractor, bytes, mime, config, Instant::now()).await
}

/// Extract a list of files sequentially.
///
/// One file's fatal error never stops the others; each entry carries its own
/// result.
pub async fn extract_all(
    inputs: &[PathBuf],
    out_dir: &Path,
    config: &ExtractionConfig,
) -> Vec<(PathBuf, Result<ExtractionOutput, ExtractError>)> {
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let result = extract_file(input, out_dir, config).await;
        results.push((input.clone(), result));
    }
    results
}

/// Blocking wrapper around [`extract_file`] for callers without a runtime.
pub fn extract_sync(
    input: &Path,
    out_dir: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("could not start async runtime: {e}")))?;
    runtime.block_on(extract_file(input, out_dir, config))
}

/// The chunked remote pipeline: plan, batch, retry, assemble.
///
/// Chunk-level failure is never fatal here — even an all-failed run comes
/// back `Ok` with empty text and a low-success warning in the report, so
/// callers always get a definite verdict with the partial text they have.
async fn remote_extract(
    extractor: &dyn ChunkExtractor,
    bytes: &[u8],
    mime: &str,
    config: &ExtractionConfig,
    started: Instant,
) -> Result<(String, ExtractionReport), ExtractError> {
    // Surface a missing credential once, before any batch is scheduled.
    extractor.ready().await?;

    let specs = plan_chunks(bytes.len() as u64)?;
    info!("Planned {} chunk(s) for {} bytes", specs.len(), bytes.len());

    let outcomes = run_batches(extractor, bytes, &specs, mime, config).await;

    let (text, report) = assemble(
        outcomes,
        started.elapsed().as_secs_f64(),
        &config.phrase_rules,
    );
    Ok((text, report))
}

fn extension_of(input: &Path) -> String {
    input
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The artifact path for `input` under `out_dir`: `{stem}_{unix_seconds}.txt`.
fn artifact_path_for(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    out_dir.join(format!("{}_{}.txt", stem, unix_seconds()))
}

async fn write_artifact(
    input: &Path,
    out_dir: &Path,
    body: &str,
) -> Result<PathBuf, ExtractError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| ExtractError::ArtifactWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
    let path = artifact_path_for(input, out_dir);
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| ExtractError::ArtifactWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    Ok(path)
}

/// On a fatal error, leave a note where the artifact would have been. Purely
/// best-effort: a failure here must not mask the original error.
async fn write_error_artifact(input: &Path, out_dir: &Path, error: &ExtractError) {
    let body = format!(
        "[extraction failed]\nfile: {}\nerror: {}\n",
        input.display(),
        error
    );
    if let Err(e) = write_artifact(input, out_dir, &body).await {
        warn!("Could not write error artifact for {}: {}", input.display(), e);
    }
}

fn placeholder_body(input: &Path, size: u64) -> String {
    format!(
        "[file too large for extraction]\nfile: {}\nsize_bytes: {}\nlimit_bytes: {}\n",
        input.display(),
        size,
        MAX_PAYLOAD_BYTES
    )
}

fn io_to_extract_error(e: std::io::Error, path: &Path) -> ExtractError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ExtractError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ExtractError::Internal(format!("I/O error on {}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::planner::Chunk;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Returns a fixed text for every chunk.
    struct FixedTextExtractor(&'static str);

    #[async_trait]
    impl ChunkExtractor for FixedTextExtractor {
        async fn extract(&self, _: &Chunk<'_>, _: &str) -> Result<String, ExtractError> {
            Ok(self.0.to_string())
        }

        async fn reset(&self) {}
    }

    /// Fails every chunk on every attempt.
    struct AlwaysFailingExtractor;

    #[async_trait]
    impl ChunkExtractor for AlwaysFailingExtractor {
        async fn extract(&self, _: &Chunk<'_>, _: &str) -> Result<String, ExtractError> {
            Err(ExtractError::Internal("upstream exploded".into()))
        }

        async fn reset(&self) {}
    }

    #[tokio::test]
    async fn missing_file_is_fatal_with_error_artifact() {
        let out = TempDir::new().unwrap();
        let err = extract_file(
            Path::new("/nonexistent/ghost.pdf"),
            out.path(),
            &ExtractionConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));

        // The fatal path still leaves a note behind.
        let entries: Vec<_> = std::fs::read_dir(out.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("ghost_"), "got: {name}");
        assert!(name.ends_with(".txt"));
    }

    #[tokio::test]
    async fn oversize_file_gets_placeholder_without_reading_payload() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("huge.pdf");
        // Sparse file: the size gate only reads metadata, never the bytes.
        let f = std::fs::File::create(&input).unwrap();
        f.set_len(MAX_PAYLOAD_BYTES + 1).unwrap();

        let out = TempDir::new().unwrap();
        let result = extract_file(&input, out.path(), &ExtractionConfig::default())
            .await
            .unwrap();

        assert_eq!(result.kind, ArtifactKind::OversizePlaceholder);
        assert!(result.text.contains("size_bytes"));
        assert!(result.artifact_path.exists());
        let written = std::fs::read_to_string(&result.artifact_path).unwrap();
        assert_eq!(written, result.text);
        assert_eq!(result.report.total_chunks, 0);
    }

    #[tokio::test]
    async fn text_native_file_is_decoded_locally_and_normalized() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, "alpha  \r\n\r\n\r\n\r\nbeta").unwrap();

        let out = TempDir::new().unwrap();
        let result = extract_file(&input, out.path(), &ExtractionConfig::default())
            .await
            .unwrap();

        assert_eq!(result.kind, ArtifactKind::DirectText);
        assert_eq!(result.text, "alpha\n\nbeta\n");
        assert!(!result.degraded);
        assert!(result.conversion_strategy.is_none());
        assert_eq!(
            std::fs::read_to_string(&result.artifact_path).unwrap(),
            result.text
        );
    }

    #[tokio::test]
    async fn artifact_name_is_stem_and_timestamp() {
        let path = artifact_path_for(Path::new("/docs/report v2.pdf"), Path::new("/tmp/out"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report v2_"), "got: {name}");
        assert!(name.ends_with(".txt"));
        let ts = &name["report v2_".len()..name.len() - ".txt".len()];
        assert!(ts.chars().all(|c| c.is_ascii_digit()), "got: {ts}");
    }

    #[tokio::test(start_paused = true)]
    async fn all_chunks_failing_yields_empty_text_and_warning_not_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("scan.pdf");
        std::fs::write(&input, b"%PDF-1.7 fake scan").unwrap();

        let out = TempDir::new().unwrap();
        let config = ExtractionConfig::default();
        let result = extract_file_inner(
            &input,
            out.path(),
            &config,
            &[],
            &AlwaysFailingExtractor,
            Instant::now(),
        )
        .await
        .expect("all-failed extraction must still return a result");

        assert_eq!(result.kind, ArtifactKind::Extracted);
        assert!(result.text.is_empty());
        assert_eq!(result.report.total_chunks, 1);
        assert_eq!(result.report.succeeded, 0);
        assert_eq!(result.report.success_rate_percent, 0.0);
        let warning = result.report.warning.expect("0% success must carry a warning");
        assert!(warning.contains("0 of 1"), "got: {warning}");
        // The (empty) artifact is still written.
        assert!(result.artifact_path.exists());
    }

    #[tokio::test]
    async fn exhausted_cascade_degrades_to_direct_extraction_of_original() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("memo.doc");
        std::fs::write(&input, b"raw office bytes").unwrap();

        let out = TempDir::new().unwrap();
        let config = ExtractionConfig::default();
        // No strategies at all: the cascade is exhausted immediately.
        let result = extract_file_inner(
            &input,
            out.path(),
            &config,
            &[],
            &FixedTextExtractor("memo body"),
            Instant::now(),
        )
        .await
        .unwrap();

        assert!(result.degraded);
        assert_eq!(result.kind, ArtifactKind::Extracted);
        assert!(result.conversion_strategy.is_none());
        assert_eq!(result.text, "memo body\n");
        let warning = result.report.warning.unwrap();
        assert!(warning.contains("unconverted original"), "got: {warning}");
        assert_eq!(
            std::fs::read_to_string(&result.artifact_path).unwrap(),
            result.text
        );
    }

    #[tokio::test]
    async fn extract_all_continues_past_a_failing_file() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("ok.txt");
        std::fs::write(&good, "fine").unwrap();
        let missing = dir.path().join("missing.txt");

        let out = TempDir::new().unwrap();
        let results = extract_all(
            &[missing.clone(), good.clone()],
            out.path(),
            &ExtractionConfig::default(),
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }
}
