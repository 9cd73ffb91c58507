//! Document ingestion — turns raw document content into ordered page
//! records and groups them into analysis windows.
//!
//! PDF parsing itself sits behind the `PageSource` trait so the pipeline
//! stays testable without a PDF library; `PlainTextSource` covers tests and
//! pre-extracted input.

pub mod types;
pub mod windowing;

use thiserror::Error;

pub use types::{Page, Window};
pub use windowing::build_windows;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Document yielded no pages with content")]
    NoContent,

    #[error("Page extraction failed: {0}")]
    Extraction(String),
}

/// Extraction seam — anything that can yield the document's pages in order.
///
/// Implementations own format detection and decoding; the pipeline only
/// requires ordered `(page_num, text)` records.
pub trait PageSource: Send + Sync {
    fn extract_pages(&self) -> Result<Vec<Page>, IngestionError>;
}

/// Extract and validate the page sequence from a source.
///
/// Fails with `NoContent` when the document has zero pages with text:
/// analyzing an empty document would return a confidently wrong empty
/// result, so this is fatal to the run.
pub fn extract(source: &dyn PageSource) -> Result<Vec<Page>, IngestionError> {
    let pages = source.extract_pages()?;

    let with_content = pages.iter().filter(|p| p.has_content).count();
    if with_content == 0 {
        return Err(IngestionError::NoContent);
    }

    tracing::debug!(
        pages = pages.len(),
        with_content,
        "Document pages extracted"
    );

    Ok(pages)
}

/// Page source over pre-extracted plain text, one page per form-feed
/// (`\u{0C}`) separated segment.
pub struct PlainTextSource {
    text: String,
}

impl PlainTextSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl PageSource for PlainTextSource {
    fn extract_pages(&self) -> Result<Vec<Page>, IngestionError> {
        Ok(self
            .text
            .split('\u{0C}')
            .enumerate()
            .map(|(i, segment)| Page::new((i + 1) as u32, segment))
            .collect())
    }
}
