//! # edgequake-pdf-batch
//!
//! Convert a batch of documents to Markdown with a Large Language Model,
//! either as one combined document or as one result per file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files (paths / URLs / bytes)
//!  │
//!  ├─ 1. Input     load into memory, dedupe by name
//!  ├─ 2. Extract   pdfium text layer or UTF-8 (spawn_blocking for PDFs)
//!  ├─ 3. Combine   combined mode only: join with `<hr />`
//!  ├─ 4. LLM       text → Markdown, with timeout + retry
//!  ├─ 5. Polish    deterministic Markdown clean-up
//!  └─ 6. Output    results + per-file outcomes + stats
//! ```
//!
//! Files that fail extraction are skipped, not fatal. Combined mode is
//! all-or-nothing on the transformation step; individual mode skips the
//! failing file and keeps going.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_batch::{convert, BatchConfig, ConversionMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = BatchConfig::default();
//!     let report = convert(["a.pdf", "b.pdf"], ConversionMode::Combined, &config).await?;
//!     println!("{}", report.results[0].markdown);
//!     for err in report.file_errors() {
//!         eprintln!("skipped: {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Interactive front-ends should hold a [`ConversionSession`] instead: it
//! owns the pending files and publishes a [`SessionSnapshot`] on every
//! change.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-batch` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! edgequake-pdf-batch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod file_set;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchConfig, BatchConfigBuilder, ConversionMode, DocumentSeparator};
pub use convert::{convert, convert_files, convert_sync, convert_to_dir};
pub use error::{BatchError, ExtractError, FileError, TransformError};
pub use file_set::{FileSet, PendingFile};
pub use orchestrator::{Orchestrator, RunLedger};
pub use output::{write_results, ConversionResult, FileOutcome, RunReport, RunStats};
pub use pipeline::extract::{AutoExtractor, PdfiumExtractor, PlainTextExtractor, TextExtractor};
pub use pipeline::transform::{LlmTransformer, Markup, MarkupTransformer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{ConversionSession, FileSummary, RunState, SessionSnapshot};
