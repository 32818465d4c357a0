//! Error types for the edgequake-pdf-batch library.
//!
//! Failures come in three layers:
//!
//! * [`BatchError`]: **Fatal**: the run produced no output at all (no files
//!   selected, nothing could be extracted, the combined transformation
//!   failed). Returned as `Err(BatchError)` from the orchestrator and the
//!   session; its [`BatchError::user_message`] is what a UI shows.
//!
//! * [`FileError`]: **Non-fatal**: one file was skipped (unreadable PDF,
//!   transient API error) but the rest of the batch continues. Stored inside
//!   [`crate::output::FileOutcome`] so callers can inspect partial success.
//!
//! * [`ExtractError`] / [`TransformError`]: returned by the adapter traits
//!   in [`crate::pipeline`]. The orchestrator decides whether each one is a
//!   per-file skip or a fatal error depending on the conversion mode.

use std::path::PathBuf;
use thiserror::Error;

/// Message used when a failure carries no human-readable text.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unknown error occurred during conversion.";

/// All fatal errors returned by the edgequake-pdf-batch library.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Validation ────────────────────────────────────────────────────────
    /// `run` was called with an empty pending set. No I/O was performed.
    #[error("No files selected.")]
    NoFilesSelected,

    // ── Run-level failures ────────────────────────────────────────────────
    /// Combined mode: every file failed extraction, nothing to transform.
    #[error("Could not extract text from any of the provided files.")]
    NothingExtracted,

    /// Individual mode: every file was skipped at one step or another.
    #[error("None of the {total} files could be converted.\nFirst error: {first_error}")]
    NothingConverted { total: usize, first_error: String },

    /// The transformation service failed and no partial output exists.
    #[error("{message}")]
    TransformFailed { message: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// The string a presentation layer should display for this failure.
    ///
    /// Transformation failures carry the service's message verbatim; an
    /// empty message falls back to [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self {
            BatchError::TransformFailed { message } if message.trim().is_empty() => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            BatchError::Internal(detail) if detail.trim().is_empty() => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A non-fatal error for a single file.
///
/// Recorded in [`crate::output::FileOutcome`] when a file is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// No text could be extracted.
    #[error("{file}: text extraction failed: {detail}")]
    ExtractionFailed { file: String, detail: String },

    /// The transformation service failed for this file.
    #[error("{file}: conversion failed: {detail}")]
    TransformFailed { file: String, detail: String },
}

impl FileError {
    /// Name of the file this error belongs to.
    pub fn file(&self) -> &str {
        match self {
            FileError::ExtractionFailed { file, .. } | FileError::TransformFailed { file, .. } => {
                file
            }
        }
    }
}

/// Failure reported by a [`crate::pipeline::extract::TextExtractor`].
///
/// The orchestrator does not distinguish between these variants: any of
/// them means "no text for this file".
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Content does not start with the `%PDF` magic bytes.
    #[error("not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The document parsed but contains no extractable text.
    #[error("document contains no extractable text")]
    NoText,

    /// PDF requires a password and none (or a wrong one) was provided.
    #[error("document is encrypted and requires a password")]
    PasswordRequired,

    /// pdfium failed to bind or to parse the document.
    #[error("pdfium: {0}")]
    Pdfium(String),

    /// A plain-text document is not valid UTF-8.
    #[error("not valid UTF-8 text")]
    InvalidUtf8,

    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Internal(String),
}

/// Failure reported by a [`crate::pipeline::transform::MarkupTransformer`].
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// The LLM API returned an error (after all retries).
    #[error("{message}")]
    Api { message: String },

    /// The call exceeded the per-call timeout (after all retries).
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with an empty document.
    #[error("The conversion service returned an empty response")]
    Empty,
}
