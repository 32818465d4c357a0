//! Configuration types for batch document-to-Markdown conversion.
//!
//! All run behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The conversion mode is *not* part of the config:
//! it is chosen per run (see [`ConversionMode`]) so a session can switch
//! between combined and individual output without rebuilding anything.

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Label given to the single result of a combined run.
pub const DEFAULT_COMBINED_LABEL: &str = "Combined Output";

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for a batch conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf_batch::{BatchConfig, DocumentSeparator};
///
/// let config = BatchConfig::builder()
///     .concurrency(4)
///     .model("gpt-4.1-mini")
///     .separator(DocumentSeparator::Comment)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Maximum number of files extracted at the same time in combined mode. Default: 8.
    ///
    /// Extraction is CPU-bound (pdfium runs on the blocking pool), so there
    /// is little point going far beyond the number of cores.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the LLM completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    ///
    /// Combined mode sends every document in one call, so this is higher
    /// than a per-page budget would be.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Marker placed between documents in combined mode. Default: `<hr />`.
    pub separator: DocumentSeparator,

    /// Label of the combined result. Default: [`DEFAULT_COMBINED_LABEL`].
    pub combined_label: String,

    /// User password for encrypted PDFs (applied to every file).
    pub password: Option<String>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            system_prompt: None,
            separator: DocumentSeparator::default(),
            combined_label: DEFAULT_COMBINED_LABEL.to_string(),
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("separator", &self.separator)
            .field("combined_label", &self.combined_label)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn separator(mut self, sep: DocumentSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    pub fn combined_label(mut self, label: impl Into<String>) -> Self {
        self.config.combined_label = label.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BatchError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(BatchError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(BatchError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.combined_label.trim().is_empty() {
            return Err(BatchError::InvalidConfig(
                "Combined output label must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the extracted texts of a run are turned into results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Merge every extracted text into one document, transform once. (default)
    #[default]
    Combined,
    /// Transform each file on its own, one result per converted file.
    Individual,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Combined => f.write_str("combined"),
            ConversionMode::Individual => f.write_str("individual"),
        }
    }
}

impl FromStr for ConversionMode {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combined" | "combine" | "merge" => Ok(ConversionMode::Combined),
            "individual" | "separate" | "per-file" => Ok(ConversionMode::Individual),
            other => Err(BatchError::InvalidConfig(format!(
                "unknown conversion mode '{other}' (expected combined or individual)"
            ))),
        }
    }
}

/// How consecutive documents are separated in combined mode.
///
/// The marker is visible both to the model and to a human reading the
/// result, so document boundaries survive the transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentSeparator {
    /// Horizontal rule: "\n\n<hr />\n\n" (default)
    #[default]
    HorizontalRule,
    /// HTML comment naming the next document: "\n\n<!-- file: NAME -->\n\n"
    Comment,
    /// Custom marker inserted between documents.
    Custom(String),
}

impl DocumentSeparator {
    /// Render the separator placed before the document called `next_file`.
    pub fn render(&self, next_file: &str) -> String {
        match self {
            DocumentSeparator::HorizontalRule => "\n\n<hr />\n\n".to_string(),
            DocumentSeparator::Comment => format!("\n\n<!-- file: {} -->\n\n", next_file),
            DocumentSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }

    /// Join `(name, text)` pairs in order, with a separator between each pair.
    pub fn join<'a>(&self, docs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let mut out = String::new();
        for (i, (name, text)) in docs.into_iter().enumerate() {
            if i > 0 {
                out.push_str(&self.render(name));
            }
            out.push_str(text);
        }
        out
    }
}
