//! Configuration types for the extraction pipeline.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, serialise the interesting parts
//! for logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ExtractError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2text::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .batch_width(5)
///     .max_attempts(2)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Number of chunks extracted concurrently within one batch. Default: 3.
    ///
    /// Batches run strictly sequentially, so this is also the peak number of
    /// in-flight remote calls. The remote service rate-limits aggressively;
    /// 3 keeps a 400MB document moving without tripping HTTP 429 storms.
    /// Raise it only if your provider quota allows.
    pub batch_width: usize,

    /// Pause between consecutive batches, in seconds. Default: 2.
    ///
    /// Applied between batches, never after the last one. Together with
    /// `batch_width` this bounds the sustained request rate against the
    /// remote service.
    pub inter_batch_delay_secs: u64,

    /// Maximum extraction attempts per chunk. Default: 3.
    ///
    /// Most failures under concurrent load are transient (overloaded backend,
    /// rate limiting). Three attempts catch the vast majority; a chunk that
    /// still fails is finalized as a failed outcome, never an error.
    pub max_attempts: u32,

    /// Base of the exponential backoff between attempts, in seconds. Default: 2.
    ///
    /// The wait before retry `n` is `backoff_base_secs * 2^(n-1)`: 2s, then
    /// 4s. Exponential backoff avoids the thundering-herd problem where every
    /// worker in a batch retries against a recovering endpoint at once.
    pub backoff_base_secs: u64,

    /// Remote model identifier, e.g. "gpt-4.1-nano". If None, provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from the
    /// environment on first use.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    /// Useful in tests or when the caller wraps the provider in middleware.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the remote completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the bytes it was given,
    /// which is exactly what transcription wants.
    pub temperature: f32,

    /// Maximum tokens the model may generate per chunk. Default: 8192.
    pub max_tokens: usize,

    /// Wall-clock timeout for one external converter invocation, in seconds.
    /// Default: 120.
    ///
    /// Applies to every cascade strategy (pandoc, native automation script,
    /// soffice). Exceeding it fails that strategy, not the file.
    pub conversion_timeout_secs: u64,

    /// Attempts for the general-purpose converter strategy. Default: 5.
    ///
    /// Each attempt cycles to the next output-option profile so a bug in one
    /// export profile cannot block every attempt.
    pub converter_attempts: u32,

    /// Minimum byte size for a conversion output to count as a real PDF.
    /// Default: 1024.
    ///
    /// LibreOffice and friends sometimes emit a header-only stub on failure;
    /// anything under this threshold fails validation and is deleted.
    pub min_valid_pdf_bytes: u64,

    /// Phrase-repetition rules applied during output normalization.
    ///
    /// The remote extractor occasionally loops, emitting the same short
    /// phrase many times in a row. Each rule collapses consecutive runs of
    /// one configured phrase. The default list covers observed loop artifacts
    /// and makes no claim of completeness; callers can extend or replace it.
    pub phrase_rules: Vec<PhraseRule>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_width: 3,
            inter_batch_delay_secs: 2,
            max_attempts: 3,
            backoff_base_secs: 2,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            conversion_timeout_secs: 120,
            converter_attempts: 5,
            min_valid_pdf_bytes: 1024,
            phrase_rules: PhraseRule::default_rules(),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("batch_width", &self.batch_width)
            .field("inter_batch_delay_secs", &self.inter_batch_delay_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_secs", &self.backoff_base_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("converter_attempts", &self.converter_attempts)
            .field("min_valid_pdf_bytes", &self.min_valid_pdf_bytes)
            .field("phrase_rules", &self.phrase_rules.len())
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// One phrase-repetition normalization rule.
///
/// Collapses 2+ consecutive occurrences of `phrase` (separated by optional
/// whitespace) down to a single occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseRule {
    /// The literal phrase to de-duplicate. Matched verbatim, not as a regex.
    pub phrase: String,
}

impl PhraseRule {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
        }
    }

    /// Loop artifacts observed in remote-extractor output.
    pub fn default_rules() -> Vec<Self> {
        ["(continued)", "END OF CHUNK", "..."]
            .iter()
            .map(|p| Self::new(*p))
            .collect()
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn batch_width(mut self, n: usize) -> Self {
        self.config.batch_width = n.max(1);
        self
    }

    pub fn inter_batch_delay_secs(mut self, secs: u64) -> Self {
        self.config.inter_batch_delay_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn backoff_base_secs(mut self, secs: u64) -> Self {
        self.config.backoff_base_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn converter_attempts(mut self, n: u32) -> Self {
        self.config.converter_attempts = n.max(1);
        self
    }

    pub fn min_valid_pdf_bytes(mut self, n: u64) -> Self {
        self.config.min_valid_pdf_bytes = n;
        self
    }

    pub fn phrase_rules(mut self, rules: Vec<PhraseRule>) -> Self {
        self.config.phrase_rules = rules;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.batch_width == 0 {
            return Err(ExtractError::InvalidConfig(
                "batch_width must be ≥ 1".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.conversion_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "conversion_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
