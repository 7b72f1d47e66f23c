//! Specialized-converter strategy: pandoc.
//!
//! Pandoc handles word-processor formats (docx, odt, rtf) well and starts
//! much faster than a full office suite, so it is tried first where it
//! applies. It has no reader for presentation or spreadsheet binaries; those
//! families skip straight to the later strategies.

use crate::config::ExtractionConfig;
use crate::convert::{ConversionStrategy, StrategyError};
use crate::formats::ConversionKind;
use async_trait::async_trait;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

pub struct PandocStrategy;

fn pandoc_candidates() -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    let mut push = |path: PathBuf| {
        if seen.insert(path.clone()) {
            candidates.push(path);
        }
    };

    if let Some(value) = env::var_os("DOC2TEXT_PANDOC_PATH").filter(|v| !v.is_empty()) {
        push(PathBuf::from(value));
    }

    push(PathBuf::from("/usr/local/bin/pandoc"));
    push(PathBuf::from("/opt/homebrew/bin/pandoc"));
    push(PathBuf::from("/usr/bin/pandoc"));
    if cfg!(target_os = "windows") {
        push(PathBuf::from("C:\\Program Files\\Pandoc\\pandoc.exe"));
    }

    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            push(dir.join("pandoc"));
            push(dir.join("pandoc.exe"));
        }
    }

    candidates
}

fn locate_pandoc() -> Result<PathBuf, StrategyError> {
    for candidate in pandoc_candidates() {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(StrategyError::Unavailable(
        "pandoc binary not found in known install paths or PATH".into(),
    ))
}

#[async_trait]
impl ConversionStrategy for PandocStrategy {
    fn name(&self) -> &'static str {
        "pandoc"
    }

    fn applicable(&self, kind: ConversionKind) -> bool {
        kind == ConversionKind::WordProcessing
    }

    async fn convert(
        &self,
        input: &Path,
        scratch_dir: &Path,
        _kind: ConversionKind,
        config: &ExtractionConfig,
    ) -> Result<PathBuf, StrategyError> {
        let pandoc = locate_pandoc()?;
        let stem = input
            .file_stem()
            .ok_or_else(|| StrategyError::Failed("input has no file name".into()))?;
        let output = scratch_dir.join(format!("{}.pdf", stem.to_string_lossy()));

        debug!("Running {} on {}", pandoc.display(), input.display());

        let child = Command::new(&pandoc)
            .arg(input)
            .arg("-o")
            .arg(&output)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StrategyError::Failed(format!("failed to spawn pandoc: {e}")))?;

        let secs = config.conversion_timeout_secs;
        let result = timeout(Duration::from_secs(secs), child.wait_with_output()).await;

        match result {
            Ok(Ok(out)) if out.status.success() => Ok(output),
            Ok(Ok(out)) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(StrategyError::Failed(format!(
                    "pandoc exited with {}: {}",
                    out.status,
                    stderr.trim()
                )))
            }
            Ok(Err(e)) => Err(StrategyError::Failed(format!(
                "failed to wait for pandoc: {e}"
            ))),
            // wait_with_output was cancelled; the child is dropped and killed.
            Err(_) => Err(StrategyError::TimedOut(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_word_processing_is_applicable() {
        let s = PandocStrategy;
        assert!(s.applicable(ConversionKind::WordProcessing));
        assert!(!s.applicable(ConversionKind::Presentation));
        assert!(!s.applicable(ConversionKind::Spreadsheet));
    }

    #[test]
    fn candidates_include_path_entries() {
        // PATH is always set in test environments; the scan must not panic
        // and must produce unique entries.
        let candidates = pandoc_candidates();
        let unique: HashSet<_> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
    }
}
