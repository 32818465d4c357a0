//! Text extraction: pull raw text out of a pending file.
//!
//! The orchestrator only needs `file → text | failure`; everything else
//! about document parsing lives behind [`TextExtractor`]. Two concrete
//! extractors ship with the crate and [`AutoExtractor`] picks between them
//! by sniffing the content:
//!
//! * [`PdfiumExtractor`]: PDFs, via pdfium's text layer. pdfium is not
//!   async-safe, so the work runs on the blocking pool.
//! * [`PlainTextExtractor`]: UTF-8 text and Markdown files.

use crate::error::ExtractError;
use crate::file_set::PendingFile;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Produces raw text for one file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, file: &PendingFile) -> Result<String, ExtractError>;
}

/// True when `bytes` starts with the PDF magic number.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Extracts the text layer of a PDF with pdfium.
///
/// Scanned PDFs without a text layer yield [`ExtractError::NoText`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(&self, file: &PendingFile) -> Result<String, ExtractError> {
        if !is_pdf(file.bytes()) {
            return Err(ExtractError::NotAPdf {
                magic: file.bytes().iter().take(4).copied().collect(),
            });
        }

        let content = file.content();
        let password = self.password.clone();
        let text = tokio::task::spawn_blocking(move || {
            extract_pdf_blocking(&content, password.as_deref())
        })
        .await
        .map_err(|e| ExtractError::Internal(e.to_string()))??;

        debug!("{}: extracted {} chars from PDF", file.name(), text.len());
        normalise_text(&text)
    }
}

/// Blocking implementation of PDF text extraction.
fn extract_pdf_blocking(bytes: &[u8], password: Option<&str>) -> Result<String, ExtractError> {
    let pdfium = pdfium_auto::bind_pdfium_silent().map_err(|e| ExtractError::Pdfium(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                ExtractError::PasswordRequired
            } else {
                ExtractError::Pdfium(err_str)
            }
        })?;

    let mut pages_text = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        match page.text() {
            Ok(text) => pages_text.push(text.all()),
            Err(e) => debug!("Page {}: no text layer ({:?})", idx + 1, e),
        }
    }

    Ok(pages_text.join("\n\n"))
}

/// Reads the file as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, file: &PendingFile) -> Result<String, ExtractError> {
        let text = std::str::from_utf8(file.bytes()).map_err(|_| ExtractError::InvalidUtf8)?;
        normalise_text(text.trim_start_matches('\u{FEFF}'))
    }
}

/// Routes PDFs to [`PdfiumExtractor`] and everything else to [`PlainTextExtractor`].
#[derive(Debug, Clone, Default)]
pub struct AutoExtractor {
    pdf: PdfiumExtractor,
    text: PlainTextExtractor,
}

impl AutoExtractor {
    pub fn new(password: Option<String>) -> Self {
        Self {
            pdf: PdfiumExtractor::with_password(password),
            text: PlainTextExtractor,
        }
    }
}

#[async_trait]
impl TextExtractor for AutoExtractor {
    async fn extract(&self, file: &PendingFile) -> Result<String, ExtractError> {
        if is_pdf(file.bytes()) {
            self.pdf.extract(file).await
        } else {
            self.text.extract(file).await
        }
    }
}

/// Normalise extracted text and reject documents with nothing in them.
///
/// Line endings become LF, NUL and form-feed characters (common in PDF
/// text layers) are dropped, trailing whitespace is trimmed per line.
pub fn normalise_text(raw: &str) -> Result<String, ExtractError> {
    let text = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{0}', '\u{c}'], "");
    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        Err(ExtractError::NoText)
    } else {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"PK\x03\x04"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn normalise_trims_and_rejects_empty() {
        assert_eq!(normalise_text("  a  \r\nb\u{c}\n\n").unwrap(), "a\nb");
        assert!(matches!(normalise_text(" \n\t\u{0} "), Err(ExtractError::NoText)));
    }

    #[tokio::test]
    async fn plain_text_extracts_utf8() {
        let f = PendingFile::new("notes.md", "\u{FEFF}# Notes\r\nhello\n".as_bytes().to_vec());
        assert_eq!(PlainTextExtractor.extract(&f).await.unwrap(), "# Notes\nhello");
    }

    #[tokio::test]
    async fn plain_text_rejects_binary() {
        let f = PendingFile::new("blob.bin", vec![0xff, 0xfe, 0x00, 0x81]);
        assert!(matches!(
            PlainTextExtractor.extract(&f).await,
            Err(ExtractError::InvalidUtf8)
        ));
    }

    #[tokio::test]
    async fn pdfium_rejects_non_pdf_without_binding() {
        let f = PendingFile::new("fake.pdf", b"hello".to_vec());
        match PdfiumExtractor::new().extract(&f).await {
            Err(ExtractError::NotAPdf { magic }) => assert_eq!(magic, b"hell".to_vec()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auto_routes_text_files() {
        let f = PendingFile::new("a.txt", b"plain words".to_vec());
        assert_eq!(AutoExtractor::default().extract(&f).await.unwrap(), "plain words");
    }
}
