//! Pipeline stages used by the orchestrator.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (combine) ──▶ transform ──▶ postprocess
//! (path/URL)  (pdfium/utf8)            (LLM)         (cleanup)
//! ```
//!
//! 1. [`input`]: read a local file or download a URL into a `PendingFile`
//! 2. [`extract`]: the extraction adapter: `TextExtractor` and its
//!    pdfium / plain-text implementations
//! 3. [`transform`]: the transformation adapter: `MarkupTransformer`
//!    and the LLM-backed implementation with timeout and retry
//! 4. [`postprocess`]: deterministic cleanup of the returned Markdown
//!
//! The combine step belongs to the orchestrator, not to a stage.

pub mod extract;
pub mod input;
pub mod postprocess;
pub mod transform;
