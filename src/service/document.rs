//! Document text extraction
//!
//! Turns raw uploaded bytes into ordered page texts. PDFs go through
//! `pdf-extract`; anything else must be UTF-8 text, split into pages on form
//! feeds.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::model::PageText;

const PDF_MAGIC: &[u8] = b"%PDF";
const PAGE_BREAK: char = '\x0c';

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("Document is empty")]
    Empty,

    #[error("Document has no pages")]
    NoPages,

    #[error("Unreadable PDF: {0}")]
    Pdf(String),

    #[error("Unsupported document format")]
    Unsupported,
}

/// Extracts ordered page texts from raw document bytes
///
/// Implementations are CPU bound and called from a blocking task.
pub trait DocumentTextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, DocumentError>;
}

/// PDF and plain-text extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl DocumentTextExtractor for PdfTextExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, DocumentError> {
        if bytes.is_empty() {
            return Err(DocumentError::Empty);
        }

        let texts = if bytes.starts_with(PDF_MAGIC) {
            pdf_pages(bytes)?
        } else {
            text_pages(bytes)?
        };

        if texts.is_empty() {
            return Err(DocumentError::NoPages);
        }

        let pages: Vec<PageText> = texts
            .into_iter()
            .zip(1u32..)
            .map(|(text, number)| PageText::new(number, text.trim()))
            .collect();

        tracing::debug!(pages = pages.len(), bytes = bytes.len(), "Document pages extracted");
        Ok(pages)
    }
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>, DocumentError> {
    // pdf-extract panics on some malformed inputs
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(DocumentError::Pdf(e.to_string())),
        Err(_) => Err(DocumentError::Pdf("parser aborted".to_string())),
    }
}

fn text_pages(bytes: &[u8]) -> Result<Vec<String>, DocumentError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::Unsupported)?;
    if text.contains('\0') {
        return Err(DocumentError::Unsupported);
    }

    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    // A trailing form feed does not open a new page
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    Ok(pages)
}
