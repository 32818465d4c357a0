//! Transformation: turn extracted text into Markdown with an LLM.
//!
//! [`MarkupTransformer`] is the only contract the orchestrator depends on.
//! [`LlmTransformer`] implements it on top of any `edgequake_llm` provider
//! and adds what the raw provider lacks:
//!
//! * a per-call timeout (`api_timeout_secs`)
//! * bounded retry with exponential backoff (`retry_backoff_ms * 2^attempt`),
//!   since rate limits and 5xx responses are transient
//! * deterministic post-processing of the returned Markdown
//!
//! With 500 ms base and 3 retries the wait sequence is 500 ms → 1 s → 2 s.

use crate::config::{BatchConfig, DEFAULT_MODEL};
use crate::error::{BatchError, TransformError};
use crate::pipeline::postprocess::clean_markdown;
use crate::prompts::{user_message, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Markdown produced by a transformation, with token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Markup {
    /// Markup without token accounting (tests, non-LLM transformers).
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Converts a unit of raw text into structured Markdown.
#[async_trait]
pub trait MarkupTransformer: Send + Sync {
    async fn transform(&self, text: &str) -> Result<Markup, TransformError>;
}

/// [`MarkupTransformer`] backed by an LLM provider.
pub struct LlmTransformer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl std::fmt::Debug for LlmTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmTransformer")
            .field("provider", &"<dyn LLMProvider>")
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl LlmTransformer {
    /// Build a transformer around an already-resolved provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &BatchConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` / the environment and build a transformer.
    pub fn from_config(config: &BatchConfig) -> Result<Self, BatchError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1)))
    }
}

#[async_trait]
impl MarkupTransformer for LlmTransformer {
    async fn transform(&self, text: &str) -> Result<Markup, TransformError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(user_message(text)),
        ];
        let call_timeout = Duration::from_secs(self.api_timeout_secs);

        let mut last_err = TransformError::Empty;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff(attempt);
                warn!(
                    "Retry {}/{} after {}ms ({})",
                    attempt,
                    self.max_retries,
                    backoff.as_millis(),
                    last_err
                );
                sleep(backoff).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&self.options))).await {
                Ok(Ok(response)) => {
                    let content = clean_markdown(&response.content);
                    if content.is_empty() {
                        last_err = TransformError::Empty;
                        continue;
                    }
                    debug!(
                        "{} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(Markup {
                        content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                    });
                }
                Ok(Err(e)) => {
                    last_err = TransformError::Api {
                        message: e.to_string(),
                    };
                }
                Err(_) => {
                    last_err = TransformError::Timeout {
                        secs: self.api_timeout_secs,
                    };
                }
            }
        }

        Err(last_err)
    }
}

/// Build `CompletionOptions` from the batch config.
fn build_options(config: &BatchConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, BatchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        BatchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, so users holding several keys
///    get a predictable default.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &BatchConfig) -> Result<Arc<dyn LLMProvider>, BatchError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| BatchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
