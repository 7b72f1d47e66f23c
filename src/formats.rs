//! Static routing table from file extension to processing path.
//!
//! The orchestrator's first decision per file is a pure lookup here:
//! text-native files are decoded locally, office formats go through the
//! conversion cascade, and everything else is sent to the remote extractor
//! as-is. The table is static on purpose — supporting a new office format
//! means adding a row here and, if needed, a cascade strategy, nothing else.

/// How a file should enter the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Decodable as UTF-8 locally; the remote extractor is bypassed entirely
    /// (direct decoding is strictly cheaper and more reliable).
    TextNative,
    /// Needs conversion to PDF before the remote extractor can read it.
    NeedsConversion(ConversionKind),
    /// Sent to the remote extractor without conversion (PDF, images, unknown).
    Remote,
}

/// Which family of office document a conversion input belongs to.
///
/// Cascade strategies gate their applicability on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    WordProcessing,
    Presentation,
    Spreadsheet,
}

/// Classify a file by its extension (case-insensitive).
///
/// Unknown or missing extensions route to the remote extractor: it is the
/// component built for arbitrary formats.
pub fn classify_extension(ext: &str) -> FileKind {
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "md" | "markdown" | "csv" | "tsv" | "json" | "xml" | "html" | "htm" | "log"
        | "yaml" | "yml" | "toml" | "rst" | "tex" => FileKind::TextNative,

        "doc" | "docx" | "odt" | "rtf" => FileKind::NeedsConversion(ConversionKind::WordProcessing),
        "ppt" | "pptx" | "odp" | "key" => FileKind::NeedsConversion(ConversionKind::Presentation),
        "xls" | "xlsx" | "ods" => FileKind::NeedsConversion(ConversionKind::Spreadsheet),

        _ => FileKind::Remote,
    }
}

/// MIME hint forwarded to the remote extractor alongside the chunk payload.
pub fn mime_hint(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "odt" => "application/vnd.oasis.opendocument.text",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "rtf" => "application/rtf",
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}
