//! Window construction — partitions the page sequence into fixed-size,
//! non-overlapping groups.
//!
//! The last window takes whatever remainder is left (at least 1 page, at
//! most `size`). Windows tile the page range exactly once, in order, so the
//! accumulator downstream sees answers in document order.

use super::types::{Page, Window};

/// Partition `pages` into consecutive windows of `size` pages.
///
/// Caller guarantees `size >= 1` (enforced by `AnalysisConfig::validate`).
/// Page text is joined with a blank line between pages so sentence
/// boundaries survive concatenation.
pub fn build_windows(pages: &[Page], size: usize) -> Vec<Window> {
    debug_assert!(size >= 1, "window size must be at least 1");

    pages
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            let text = chunk
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            Window {
                window_num: (i + 1) as u32,
                pages: chunk.iter().map(|p| p.page_num).collect(),
                text,
                source_pages: chunk.to_vec(),
            }
        })
        .collect()
}
