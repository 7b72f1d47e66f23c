//! Native-office-automation strategy.
//!
//! Where a native office application and a scripting bridge exist (AppleScript
//! on macOS, Windows Script Host on Windows), the installed application can
//! export documents it owns to PDF with better fidelity than any third-party
//! converter. The strategy writes a small driver script to a temp file, runs
//! the platform's script host against it under a timeout, and expects the
//! exported PDF in the scratch directory.
//!
//! The script file is a [`tempfile::NamedTempFile`], so it is removed on
//! every exit path — success, validation failure, or error — without manual
//! cleanup code. On platforms without an automation bridge the strategy
//! reports itself unavailable, which the cascade treats as an ordinary
//! advance-to-next failure.

use crate::config::ExtractionConfig;
use crate::convert::{ConversionStrategy, StrategyError};
use crate::formats::ConversionKind;
use async_trait::async_trait;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

pub struct NativeAutomationStrategy;

/// The script host command and script suffix for this platform, if any.
fn script_host() -> Option<(&'static str, &'static str)> {
    if cfg!(target_os = "macos") {
        Some(("osascript", ".applescript"))
    } else if cfg!(target_os = "windows") {
        Some(("cscript", ".vbs"))
    } else {
        None
    }
}

/// Render the driver script for the platform's office automation interface.
fn automation_script(input: &Path, output: &Path, kind: ConversionKind) -> String {
    let app = match kind {
        ConversionKind::Presentation => "Microsoft PowerPoint",
        ConversionKind::WordProcessing => "Microsoft Word",
        ConversionKind::Spreadsheet => "Microsoft Excel",
    };

    if cfg!(target_os = "windows") {
        // WSH drives the COM automation object of the matching application.
        // The open collection and PDF save call differ per application.
        let (prog_id, open_call, save_call) = match kind {
            ConversionKind::Presentation => (
                "PowerPoint.Application",
                format!("app.Presentations.Open(\"{}\", , , False)", input.display()),
                format!("doc.SaveAs \"{}\", 32", output.display()),
            ),
            ConversionKind::WordProcessing => (
                "Word.Application",
                format!("app.Documents.Open(\"{}\")", input.display()),
                format!("doc.SaveAs2 \"{}\", 17", output.display()),
            ),
            ConversionKind::Spreadsheet => (
                "Excel.Application",
                format!("app.Workbooks.Open(\"{}\")", input.display()),
                format!("doc.ExportAsFixedFormat 0, \"{}\"", output.display()),
            ),
        };
        format!(
            "Set app = CreateObject(\"{prog_id}\")\n\
             Set doc = {open_call}\n\
             {save_call}\n\
             doc.Close\n\
             app.Quit\n"
        )
    } else {
        let noun = match kind {
            ConversionKind::Presentation => "presentation",
            ConversionKind::WordProcessing => "document",
            ConversionKind::Spreadsheet => "workbook",
        };
        format!(
            "tell application \"{app}\"\n\
             \topen POSIX file \"{input}\"\n\
             \tsave active {noun} in POSIX file \"{output}\" as \"PDF\"\n\
             \tclose active {noun} saving no\n\
             end tell\n",
            input = input.display(),
            output = output.display(),
        )
    }
}

#[async_trait]
impl ConversionStrategy for NativeAutomationStrategy {
    fn name(&self) -> &'static str {
        "native-automation"
    }

    fn applicable(&self, _kind: ConversionKind) -> bool {
        script_host().is_some()
    }

    async fn convert(
        &self,
        input: &Path,
        scratch_dir: &Path,
        kind: ConversionKind,
        config: &ExtractionConfig,
    ) -> Result<PathBuf, StrategyError> {
        let (host, suffix) = script_host().ok_or_else(|| {
            StrategyError::Unavailable("no office automation interface on this platform".into())
        })?;

        let stem = input
            .file_stem()
            .ok_or_else(|| StrategyError::Failed("input has no file name".into()))?;
        let output = scratch_dir.join(format!("{}.pdf", stem.to_string_lossy()));

        // Removed on drop, whatever path this function exits through.
        let mut script = NamedTempFile::with_suffix(suffix)
            .map_err(StrategyError::Io)?;
        script
            .write_all(automation_script(input, &output, kind).as_bytes())
            .map_err(StrategyError::Io)?;
        script.flush().map_err(StrategyError::Io)?;

        debug!(
            "Running {} automation script for {}",
            host,
            input.display()
        );

        let child = Command::new(host)
            .arg(script.path())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StrategyError::Unavailable(format!("failed to spawn {host}: {e}")))?;

        let secs = config.conversion_timeout_secs;
        match timeout(Duration::from_secs(secs), child.wait_with_output()).await {
            Ok(Ok(out)) if out.status.success() => Ok(output),
            Ok(Ok(out)) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(StrategyError::Failed(format!(
                    "{host} exited with {}: {}",
                    out.status,
                    stderr.trim()
                )))
            }
            Ok(Err(e)) => Err(StrategyError::Failed(format!(
                "failed to wait for {host}: {e}"
            ))),
            Err(_) => Err(StrategyError::TimedOut(secs)),
        }
    }
}
