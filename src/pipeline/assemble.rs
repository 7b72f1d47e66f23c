//! Result assembly: ordered reassembly of chunk outcomes plus deterministic
//! cleanup of the extracted text.
//!
//! ## Why is normalization necessary?
//!
//! The remote extractor's raw output carries artefacts that are harmless to a
//! model but ugly in a text artifact:
//!
//! - wrapping output in ``` fences despite the prompt saying not to
//! - Windows-style `\r\n` line endings
//! - stray whitespace hugging line breaks
//! - looping on a short phrase and emitting it dozens of times in a row
//!
//! The cleanup passes below are cheap, deterministic `&str → String` rules
//! with no shared state, applied in a fixed order, and idempotent as a whole:
//! normalizing already-normalized text returns it unchanged. Keeping them
//! here rather than in the prompt means the prompt stays focused on *what to
//! extract*, not on formatting edge cases.

use crate::config::PhraseRule;
use crate::report::{ChunkOutcome, ExtractionReport, LOW_SUCCESS_WARNING_THRESHOLD};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reassemble chunk outcomes into final text and a report.
///
/// Outcomes are sorted by ordinal before concatenation, so the result is
/// invariant under any completion-order bookkeeping upstream. Failed chunks
/// contribute no text but stay visible in the report.
pub fn assemble(
    mut outcomes: Vec<ChunkOutcome>,
    elapsed_secs: f64,
    rules: &[PhraseRule],
) -> (String, ExtractionReport) {
    outcomes.sort_by_key(|o| o.ordinal);

    let total = outcomes.len();
    let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
    let failed = total - succeeded;

    let success_rate_percent = if total == 0 {
        100.0
    } else {
        succeeded as f64 / total as f64 * 100.0
    };

    let warning = if total > 0 && success_rate_percent < LOW_SUCCESS_WARNING_THRESHOLD {
        Some(format!(
            "Extraction incomplete: only {succeeded} of {total} chunks succeeded \
             ({success_rate_percent:.0}%); the output is partial."
        ))
    } else {
        None
    };

    let raw = outcomes
        .iter()
        .filter(|o| o.succeeded)
        .map(|o| o.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let text = normalize_text(&raw, rules);

    let report = ExtractionReport {
        total_chunks: total,
        succeeded,
        failed,
        success_rate_percent,
        elapsed_secs,
        warning,
        chunks: outcomes,
    };

    (text, report)
}

/// Apply all normalization rules in order.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip fenced code-block marker lines (content between fences is kept)
/// 3. Strip whitespace immediately adjacent to newlines
/// 4. Collapse repeated runs of configured phrases
/// 5. Collapse 3+ identical consecutive lines down to one
/// 6. Collapse 3+ consecutive newlines down to 2
/// 7. Ensure the text ends with exactly one newline
pub fn normalize_text(input: &str, rules: &[PhraseRule]) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    let s = normalize_line_endings(input);
    let s = strip_fence_markers(&s);
    let s = trim_line_edges(&s);
    let s = collapse_phrase_runs(&s, rules);
    let s = collapse_repeated_lines(&s);
    let s = collapse_blank_runs(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip fence marker lines ─────────────────────────────────────────

static RE_FENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*$").unwrap());

fn strip_fence_markers(input: &str) -> String {
    input
        .lines()
        .filter(|line| !RE_FENCE_LINE.is_match(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Trim whitespace adjacent to newlines ─────────────────────────────

fn trim_line_edges(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse repeated phrase runs ────────────────────────────────────
//
// The remote extractor occasionally loops and emits the same short phrase
// many times in a row. The phrase list is configuration, not code: it is
// language-specific and known to be incomplete.

fn collapse_phrase_runs(input: &str, rules: &[PhraseRule]) -> String {
    let mut out = input.to_string();
    for rule in rules {
        if rule.phrase.is_empty() {
            continue;
        }
        let escaped = regex::escape(&rule.phrase);
        // Two or more occurrences separated by optional whitespace.
        let pattern = format!(r"(?:{escaped}\s*)+{escaped}");
        if let Ok(re) = Regex::new(&pattern) {
            out = re.replace_all(&out, rule.phrase.as_str()).to_string();
        }
    }
    out
}

// ── Rule 5: Collapse identical consecutive lines ─────────────────────────────

fn collapse_repeated_lines(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let mut run = 1;
        while i + run < lines.len() && lines[i + run] == line {
            run += 1;
        }
        if run >= 3 && !line.is_empty() {
            out.push(line);
        } else {
            for _ in 0..run {
                out.push(line);
            }
        }
        i += run;
    }
    out.join("\n")
}

// ── Rule 6: Collapse blank-line runs ─────────────────────────────────────────

static RE_NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_runs(input: &str) -> String {
    RE_NEWLINE_RUN.replace_all(input, "\n\n").to_string()
}

// ── Rule 7: Ensure single final newline ──────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChunkError;

    fn ok(ordinal: usize, text: &str) -> ChunkOutcome {
        ChunkOutcome::success(ordinal, text.to_string(), 0, 1)
    }

    fn bad(ordinal: usize) -> ChunkOutcome {
        ChunkOutcome::failure(
            ordinal,
            ChunkError::RemoteFailed {
                ordinal,
                attempts: 3,
                detail: "x".into(),
            },
            2,
            1,
        )
    }

    #[test]
    fn ordering_invariant_under_shuffle() {
        let sorted = vec![ok(1, "one"), ok(2, "two"), ok(3, "three")];
        let shuffled = vec![ok(3, "three"), ok(1, "one"), ok(2, "two")];

        let (a, _) = assemble(sorted, 1.0, &[]);
        let (b, _) = assemble(shuffled, 1.0, &[]);
        assert_eq!(a, b);
        assert_eq!(a, "one\ntwo\nthree\n");
    }

    #[test]
    fn failed_chunks_contribute_nothing_but_are_reported() {
        let (text, report) = assemble(vec![ok(1, "alpha"), bad(2), ok(3, "gamma")], 1.0, &[]);
        assert_eq!(text, "alpha\ngamma\n");
        assert_eq!(report.total_chunks, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(report.warning.is_none()); // 66% is above the threshold
    }

    #[test]
    fn all_failed_yields_empty_text_and_warning() {
        let (text, report) = assemble(vec![bad(1), bad(2)], 1.0, &[]);
        assert!(text.is_empty());
        assert_eq!(report.success_rate_percent, 0.0);
        assert!(report.warning.is_some());
    }

    #[test]
    fn all_succeeded_yields_full_rate_and_no_warning() {
        let (_, report) = assemble(vec![ok(1, "a"), ok(2, "b")], 1.0, &[]);
        assert_eq!(report.success_rate_percent, 100.0);
        assert!(report.warning.is_none());
    }

    #[test]
    fn low_success_rate_carries_warning() {
        let (text, report) = assemble(vec![ok(1, "a"), bad(2), bad(3)], 1.0, &[]);
        assert_eq!(text, "a\n"); // partial text still returned
        assert!(report.success_rate_percent < 50.0);
        let warning = report.warning.unwrap();
        assert!(warning.contains("1 of 3"), "got: {warning}");
    }

    #[test]
    fn strips_fence_marker_lines_keeping_content() {
        let input = "```text\nkeep me\n```\nand me";
        assert_eq!(normalize_text(input, &[]), "keep me\nand me\n");
    }

    #[test]
    fn trims_whitespace_adjacent_to_newlines() {
        let input = "left  \n   right\nmiddle";
        assert_eq!(normalize_text(input, &[]), "left\nright\nmiddle\n");
    }

    #[test]
    fn collapses_blank_line_runs_to_one_blank() {
        let input = "a\n\n\n\n\nb";
        assert_eq!(normalize_text(input, &[]), "a\n\nb\n");
    }

    #[test]
    fn collapses_configured_phrase_runs() {
        let rules = vec![PhraseRule::new("(continued)")];
        let input = "text (continued) (continued) (continued) more";
        assert_eq!(
            normalize_text(input, &rules),
            "text (continued) more\n"
        );
    }

    #[test]
    fn collapses_repeated_identical_lines() {
        let input = "echo\necho\necho\necho\ndone";
        assert_eq!(normalize_text(input, &[]), "echo\ndone\n");
    }

    #[test]
    fn two_identical_lines_are_left_alone() {
        let input = "twice\ntwice\nend";
        assert_eq!(normalize_text(input, &[]), "twice\ntwice\nend\n");
    }

    #[test]
    fn normalization_is_idempotent() {
        let rules = PhraseRule::default_rules();
        let messy = "```markdown\r\nTitle   \n\n\n\nloop loop loop\nloop\n(continued) (continued)\n```\n";
        let once = normalize_text(messy, &rules);
        let twice = normalize_text(&once, &rules);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_text("", &[]), "");
        assert_eq!(normalize_text("   \n\n  ", &[]), "");
    }
}
