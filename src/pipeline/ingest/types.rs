//! Core types for document ingestion: pages and page windows.
//!
//! Pages are created once during extraction and never mutated. Windows are
//! contiguous, non-overlapping page groups sized by `AnalysisConfig` —
//! the unit of work for one batch of expert calls.

use serde::Serialize;

/// A single extracted document page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// 1-indexed page number as it appears in the source document.
    pub page_num: u32,
    pub text: String,
    pub char_count: usize,
    /// True if the page has any text left after trimming whitespace.
    pub has_content: bool,
}

impl Page {
    pub fn new(page_num: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        let has_content = !text.trim().is_empty();
        let char_count = text.chars().count();
        Self {
            page_num,
            text,
            char_count,
            has_content,
        }
    }
}

/// A contiguous group of pages processed together in one batch of expert calls.
#[derive(Debug, Clone)]
pub struct Window {
    /// 1-indexed sequential window number.
    pub window_num: u32,
    /// Page numbers covered by this window, ascending and contiguous.
    pub pages: Vec<u32>,
    /// Concatenated page text. May be shortened by the token budget governor
    /// before dispatch; it never contains text from outside `pages`.
    pub text: String,
    /// The original page records, kept for re-slicing after truncation.
    pub source_pages: Vec<Page>,
}

impl Window {
    pub fn contains_page(&self, page_num: u32) -> bool {
        self.pages.contains(&page_num)
    }

    /// First page of the window — the documented fallback target when an
    /// answer cites only pages outside the window.
    pub fn first_page(&self) -> u32 {
        self.pages.first().copied().unwrap_or(1)
    }

    pub fn page_span(&self) -> (u32, u32) {
        let first = self.pages.first().copied().unwrap_or(0);
        let last = self.pages.last().copied().unwrap_or(0);
        (first, last)
    }

    /// Same window with replacement text, used after budget truncation.
    /// The replacement must originate from this window's pages.
    pub fn with_text(&self, text: impl Into<String>) -> Window {
        Window {
            text: text.into(),
            ..self.clone()
        }
    }
}
