//! General-converter strategy: LibreOffice headless.
//!
//! LibreOffice reads every office family we classify, so this strategy is
//! last in the cascade and applicable to all of them. It is also the
//! flakiest: a lingering `soffice` instance holds a profile lock that makes
//! new headless invocations exit immediately without converting, and some
//! documents only convert under a particular export-option profile. The
//! strategy compensates on both fronts: it kills lingering instances before
//! starting, and it retries up to [`ExtractionConfig::converter_attempts`]
//! times, cycling through a set of export profiles.

use crate::config::ExtractionConfig;
use crate::convert::{is_valid_pdf, ConversionStrategy, StrategyError};
use crate::formats::ConversionKind;
use async_trait::async_trait;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

pub struct SofficeStrategy;

/// Export-option profiles, cycled across retry attempts. The plain profile
/// works for most documents; the later ones paper over known exporter quirks
/// with specific filter options.
const EXPORT_PROFILES: &[&[&str]] = &[
    &["--convert-to", "pdf"],
    &["--convert-to", "pdf:writer_pdf_Export"],
    &["--convert-to", "pdf", "--norestore"],
    &[
        "--convert-to",
        "pdf:writer_pdf_Export:{\"ReduceImageResolution\":{\"type\":\"boolean\",\"value\":false}}",
    ],
];

fn soffice_candidates() -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    let mut push = |path: PathBuf| {
        if seen.insert(path.clone()) {
            candidates.push(path);
        }
    };

    for var in ["DOC2TEXT_SOFFICE_PATH", "SOFFICE_PATH", "LIBREOFFICE_PATH"] {
        if let Some(value) = env::var_os(var).filter(|v| !v.is_empty()) {
            push(PathBuf::from(value));
        }
    }

    push(PathBuf::from("/usr/bin/soffice"));
    push(PathBuf::from("/usr/local/bin/soffice"));
    push(PathBuf::from(
        "/Applications/LibreOffice.app/Contents/MacOS/soffice",
    ));
    if let Some(prefix) = env::var_os("HOMEBREW_PREFIX") {
        push(PathBuf::from(prefix).join("bin/soffice"));
    }
    if cfg!(target_os = "windows") {
        push(PathBuf::from(
            "C:\\Program Files\\LibreOffice\\program\\soffice.exe",
        ));
        push(PathBuf::from(
            "C:\\Program Files (x86)\\LibreOffice\\program\\soffice.exe",
        ));
    }

    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            push(dir.join("soffice"));
            push(dir.join("soffice.exe"));
        }
    }

    candidates
}

fn locate_soffice() -> Result<PathBuf, StrategyError> {
    for candidate in soffice_candidates() {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(StrategyError::Unavailable(
        "soffice binary not found in known install paths or PATH".into(),
    ))
}

/// Best-effort kill of lingering LibreOffice instances. A stale instance
/// holds the user-profile lock, which makes every subsequent headless run
/// exit without converting anything.
async fn kill_lingering_instances() {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("taskkill");
        c.args(["/IM", "soffice.exe", "/F"]);
        c
    } else {
        let mut c = Command::new("pkill");
        c.args(["-f", "soffice"]);
        c
    };

    match cmd
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
    {
        Ok(status) if status.success() => {
            debug!("Killed lingering soffice instances");
        }
        // Non-zero just means nothing matched.
        Ok(_) => {}
        Err(e) => debug!("Could not probe for lingering soffice instances: {}", e),
    }
}

async fn run_one_attempt(
    soffice: &Path,
    profile: &[&str],
    input: &Path,
    scratch_dir: &Path,
    timeout_secs: u64,
) -> Result<(), StrategyError> {
    let child = Command::new(soffice)
        .arg("--headless")
        .args(profile)
        .arg("--outdir")
        .arg(scratch_dir)
        .arg(input)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StrategyError::Failed(format!("failed to spawn soffice: {e}")))?;

    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(Ok(out)) if out.status.success() => Ok(()),
        Ok(Ok(out)) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            Err(StrategyError::Failed(format!(
                "soffice exited with {}: {}",
                out.status,
                stderr.trim()
            )))
        }
        Ok(Err(e)) => Err(StrategyError::Failed(format!(
            "failed to wait for soffice: {e}"
        ))),
        Err(_) => Err(StrategyError::TimedOut(timeout_secs)),
    }
}

#[async_trait]
impl ConversionStrategy for SofficeStrategy {
    fn name(&self) -> &'static str {
        "soffice"
    }

    fn applicable(&self, _kind: ConversionKind) -> bool {
        true
    }

    async fn convert(
        &self,
        input: &Path,
        scratch_dir: &Path,
        _kind: ConversionKind,
        config: &ExtractionConfig,
    ) -> Result<PathBuf, StrategyError> {
        let soffice = locate_soffice()?;
        let stem = input
            .file_stem()
            .ok_or_else(|| StrategyError::Failed("input has no file name".into()))?;
        // soffice names its output after the input stem inside --outdir.
        let output = scratch_dir.join(format!("{}.pdf", stem.to_string_lossy()));

        kill_lingering_instances().await;

        let mut last_err = None;
        for attempt in 1..=config.converter_attempts {
            let profile = EXPORT_PROFILES[(attempt as usize - 1) % EXPORT_PROFILES.len()];
            debug!(
                "soffice attempt {}/{} with profile {:?} for {}",
                attempt,
                config.converter_attempts,
                profile,
                input.display()
            );

            match run_one_attempt(
                &soffice,
                profile,
                input,
                scratch_dir,
                config.conversion_timeout_secs,
            )
            .await
            {
                Ok(()) => {
                    if is_valid_pdf(&output, config.min_valid_pdf_bytes).await {
                        return Ok(output);
                    }
                    warn!(
                        "soffice attempt {} produced an invalid PDF for {}, retrying",
                        attempt,
                        input.display()
                    );
                    if let Err(e) = tokio::fs::remove_file(&output).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            warn!("Could not delete invalid output {}: {}", output.display(), e);
                        }
                    }
                    last_err = Some(StrategyError::Failed(
                        "soffice produced an invalid PDF".into(),
                    ));
                }
                Err(e) => {
                    warn!("soffice attempt {} failed: {}", attempt, e);
                    // A timed-out or crashed run can leave a stale instance
                    // behind that would wedge the next attempt.
                    kill_lingering_instances().await;
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            StrategyError::Failed("soffice made no conversion attempts".into())
        }))
    }
}
