//! Prompts sent to the remote extraction model.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the extraction behaviour (e.g.
//!    tightening the no-commentary rule) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the chunk-scoping context
//!    without a live provider, so prompt regressions are easy to catch.

/// Default system prompt for extracting plain text from a document chunk.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a document text extractor. You receive one base64-encoded fragment of a larger file and must return its textual content.

Follow these rules precisely:

1. CONTENT
   - Return ALL readable text contained in this fragment, in reading order
   - Preserve paragraph breaks with blank lines
   - Do not summarise, translate, or paraphrase

2. SCOPE
   - Extract ONLY the fragment you were given
   - Do NOT invent text that would plausibly precede or follow it
   - If the fragment contains no readable text, return an empty response

3. OUTPUT FORMAT
   - Output ONLY the extracted text
   - Do NOT wrap the output in ``` fences
   - Do NOT add commentary, headers, or explanations"#;

/// Build the chunk-scoping context message.
///
/// Telling the model which slice of the document it holds ("chunk K of N")
/// keeps its output scoped to that slice — without it, models tend to
/// hallucinate continuations of neighbouring chunks, which the assembler
/// would then duplicate.
pub fn chunk_context(ordinal: usize, total: usize, mime_hint: &str) -> String {
    format!(
        "This is chunk {ordinal} of {total} of a document of type '{mime_hint}'. \
         Extract the text of this chunk only."
    )
}
