//! Remote extraction: send one chunk to the provider and return its text.
//!
//! This module is intentionally thin — the instructional context lives in
//! [`crate::prompts`] and all retry logic in [`crate::pipeline::retry`], so
//! transport concerns never tangle with policy.
//!
//! ## The shared client handle
//!
//! The provider handle is process-wide and lazily created. Any chunk
//! processor that suspects the handle is poisoned (stale connection pool,
//! dead session) may tear it down via [`ChunkExtractor::reset`]; the next
//! call recreates it. Concurrent recreation is harmless — check-and-create
//! is idempotent and the last writer wins, since correctness only requires
//! *a* valid handle to exist before the next call.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::planner::Chunk;
use crate::prompts::{chunk_context, EXTRACTION_SYSTEM_PROMPT};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Seam between the schedulers and the network.
///
/// [`RemoteExtractor`] is the production implementation; tests inject doubles
/// to exercise retry and batching behaviour without a provider.
#[async_trait]
pub trait ChunkExtractor: Send + Sync {
    /// Extract the text of one chunk. Returns the remote response verbatim.
    async fn extract(&self, chunk: &Chunk<'_>, mime_hint: &str) -> Result<String, ExtractError>;

    /// Tear down any shared client state so the next call reinitialises it.
    async fn reset(&self);

    /// Fail fast if the extractor cannot serve requests (missing credential).
    ///
    /// Called once per payload before any batch is scheduled, so a
    /// misconfiguration surfaces once per file instead of once per chunk.
    async fn ready(&self) -> Result<(), ExtractError> {
        Ok(())
    }
}

/// Process-wide provider handle. `None` until first use or after a reset.
static PROVIDER_HANDLE: Lazy<RwLock<Option<Arc<dyn LLMProvider>>>> =
    Lazy::new(|| RwLock::new(None));

/// Stateless wrapper around the remote text-extraction call for one chunk.
pub struct RemoteExtractor {
    config: ExtractionConfig,
}

impl RemoteExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Get the shared provider handle, creating it if absent.
    ///
    /// Racing callers may both create a provider; both instances are valid
    /// and the second write simply replaces the first.
    async fn handle(&self) -> Result<Arc<dyn LLMProvider>, ExtractError> {
        if let Some(provider) = PROVIDER_HANDLE.read().await.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let provider = resolve_provider(&self.config)?;
        *PROVIDER_HANDLE.write().await = Some(Arc::clone(&provider));
        debug!("Remote extraction provider initialised");
        Ok(provider)
    }

    /// Fail fast if no credential is configured.
    ///
    /// The orchestrator calls this before scheduling any batch so a missing
    /// API key surfaces once per file instead of once per chunk.
    pub async fn ensure_ready(&self) -> Result<(), ExtractError> {
        self.handle().await.map(|_| ())
    }
}

#[async_trait]
impl ChunkExtractor for RemoteExtractor {
    async fn extract(&self, chunk: &Chunk<'_>, mime_hint: &str) -> Result<String, ExtractError> {
        let provider = self.handle().await?;

        let spec = chunk.spec;
        let messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::system(chunk_context(spec.ordinal, spec.total, mime_hint)),
            ChatMessage::user(BASE64.encode(chunk.bytes)),
        ];

        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ExtractError::RemoteCallFailed {
                message: format!("{e}"),
            })?;

        debug!(
            "Chunk {}/{}: {} input tokens, {} output tokens",
            spec.ordinal, spec.total, response.prompt_tokens, response.completion_tokens
        );

        // Returned verbatim: interpretation and cleanup belong to the assembler.
        Ok(response.content)
    }

    async fn reset(&self) {
        *PROVIDER_HANDLE.write().await = None;
        info!("Remote extraction provider handle cleared; will reinitialise on next call");
    }

    async fn ready(&self) -> Result<(), ExtractError> {
        self.ensure_ready().await
    }
}

/// Resolve the provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed and
///    configured it; used as-is. Useful in tests or behind middleware.
/// 2. **Named provider + model** (`config.provider_name`) — reads the
///    corresponding API key from the environment.
/// 3. **Environment pair** (`DOC2TEXT_PROVIDER` + `DOC2TEXT_MODEL`) — a
///    deployment-level choice (shell profile, CI), honoured before full
///    auto-detection so the model choice wins even when several API keys are
///    present.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — scans all known
///    API key variables and picks the first available provider.
fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("DOC2TEXT_PROVIDER"),
        std::env::var("DOC2TEXT_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when its key is present so users with several
    // provider keys get a deterministic default.
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ExtractorNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No provider could be auto-detected from the environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                 Error: {e}"
            ),
        })?;

    Ok(provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ExtractError::ExtractorNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}
