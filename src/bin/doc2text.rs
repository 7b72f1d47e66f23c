//! CLI binary for doc2text.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints per-file results.

use anyhow::{Context, Result};
use clap::Parser;
use doc2text::{extract_file, ArtifactKind, ExtractionConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one document (artifact lands in the current directory)
  doc2text report.pdf

  # Several documents into a dedicated output directory
  doc2text -o extracted/ report.pdf slides.pptx notes.docx

  # Use a specific model
  doc2text --model gpt-4.1 --provider openai scan.pdf

  # Wider batches, fewer retries
  doc2text --batch-width 5 --max-attempts 2 big-archive.pdf

  # Machine-readable per-file reports
  doc2text --json report.pdf > report.json

PROCESSING PATHS:
  text-native (txt, md, csv, json, html, …)  decoded locally, no API calls
  office (docx, pptx, xlsx, odt, …)          converted to PDF locally first
                                             (pandoc → office automation → soffice)
  everything else (pdf, images, unknown)     sent to the remote extractor as-is
  over 400 MB                                placeholder artifact, nothing sent

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY       OpenAI API key
  ANTHROPIC_API_KEY    Anthropic API key
  GEMINI_API_KEY       Google Gemini API key
  DOC2TEXT_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  DOC2TEXT_MODEL       Override model ID
  DOC2TEXT_PANDOC_PATH Path to the pandoc binary
  DOC2TEXT_SOFFICE_PATH Path to the LibreOffice soffice binary

SETUP:
  1. Set API key:  export OPENAI_API_KEY=sk-...
  2. Extract:      doc2text document.pdf -o out/
"#;

/// Extract plain text from documents using a remote LLM extractor.
#[derive(Parser, Debug)]
#[command(
    name = "doc2text",
    version,
    about = "Extract plain text from documents using a remote LLM extractor",
    long_about = "Extract plain text from arbitrary documents. Text-native files are decoded \
locally; office formats are converted to PDF by a local converter cascade; everything else is \
chunked and sent to a remote LLM extractor (OpenAI, Anthropic, Google Gemini, or any \
OpenAI-compatible endpoint). Each input produces exactly one timestamped .txt artifact.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input document paths.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the .txt artifacts. Default: current directory.
    #[arg(short, long, env = "DOC2TEXT_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "DOC2TEXT_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "DOC2TEXT_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Chunks extracted concurrently within one batch.
    #[arg(long, env = "DOC2TEXT_BATCH_WIDTH", default_value_t = 3)]
    batch_width: usize,

    /// Pause between batches, in seconds.
    #[arg(long, env = "DOC2TEXT_BATCH_DELAY", default_value_t = 2)]
    batch_delay: u64,

    /// Extraction attempts per chunk.
    #[arg(long, env = "DOC2TEXT_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "DOC2TEXT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOC2TEXT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-converter timeout in seconds.
    #[arg(long, env = "DOC2TEXT_CONVERT_TIMEOUT", default_value_t = 120)]
    convert_timeout: u64,

    /// Output structured JSON reports instead of summary lines.
    #[arg(long, env = "DOC2TEXT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2TEXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).context("Invalid configuration")?;

    // ── Progress bar over files ──────────────────────────────────────────
    let bar = if show_progress && cli.inputs.len() > 1 {
        let bar = ProgressBar::new(cli.inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let mut failed = 0usize;
    for input in &cli.inputs {
        if let Some(ref bar) = bar {
            bar.set_message(input.display().to_string());
        }

        match extract_file(input, &cli.output, &config).await {
            Ok(output) => {
                if cli.json {
                    let json = serde_json::to_string_pretty(&output)
                        .context("Failed to serialise report")?;
                    println!("{json}");
                } else if !cli.quiet {
                    let line = summary_line(input, &output);
                    match bar {
                        Some(ref bar) => bar.println(line),
                        None => eprintln!("{line}"),
                    }
                    if let Some(ref warning) = output.report.warning {
                        let line = format!("   {}", cyan(warning));
                        match bar {
                            Some(ref bar) => bar.println(line),
                            None => eprintln!("{line}"),
                        }
                    }
                }
            }
            Err(e) => {
                failed += 1;
                let line = format!("{} {}  {}", red("✗"), input.display(), red(&e.to_string()));
                match bar {
                    Some(ref bar) => bar.println(line),
                    None => eprintln!("{line}"),
                }
            }
        }

        if let Some(ref bar) = bar {
            bar.inc(1);
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if !cli.quiet && !cli.json && cli.inputs.len() > 1 {
        let ok = cli.inputs.len() - failed;
        eprintln!(
            "{} {}/{} files extracted",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&ok.to_string()),
            cli.inputs.len()
        );
    }

    if failed == cli.inputs.len() && !cli.inputs.is_empty() {
        // Every file failed; exit non-zero so scripts notice.
        std::process::exit(1);
    }
    io::stdout().flush().ok();
    Ok(())
}

/// One line per successfully processed file.
fn summary_line(input: &std::path::Path, output: &doc2text::ExtractionOutput) -> String {
    let path_note = format!("→  {}", bold(&output.artifact_path.display().to_string()));
    match output.kind {
        ArtifactKind::DirectText => {
            format!(
                "{} {}  {}  {}",
                green("✔"),
                input.display(),
                dim("direct decode"),
                path_note
            )
        }
        ArtifactKind::OversizePlaceholder => {
            format!(
                "{} {}  {}  {}",
                cyan("⚠"),
                input.display(),
                dim("over size limit, placeholder written"),
                path_note
            )
        }
        ArtifactKind::Extracted => {
            let report = &output.report;
            let via = match (&output.conversion_strategy, output.degraded) {
                (Some(s), _) => dim(&format!("via {s}")),
                (None, true) => red("unconverted original"),
                (None, false) => dim("remote"),
            };
            format!(
                "{} {}  {}/{} chunks  {:.1}s  {}  {}",
                if report.failed == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                input.display(),
                report.succeeded,
                report.total_chunks,
                report.elapsed_secs,
                via,
                path_note
            )
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .batch_width(cli.batch_width)
        .inter_batch_delay_secs(cli.batch_delay)
        .max_attempts(cli.max_attempts)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .conversion_timeout_secs(cli.convert_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    Ok(builder.build()?)
}
