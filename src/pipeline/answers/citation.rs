//! Citation marker wire format: `<PDF pg N>`, `<PDF pg N, M, K>`,
//! `<PDF pg N-M>`.
//!
//! All three forms are accepted on read; writes always emit the
//! comma-separated form. The marker is the load-bearing contract between
//! expert responses and the export layer, so parsing and formatting must
//! round-trip exactly.

use regex::Regex;

/// Marker prefix used for cheap presence checks.
pub const MARKER_PREFIX: &str = "<PDF pg";

fn marker_regex() -> Regex {
    Regex::new(r"<PDF pg\s+([0-9\s,\-]+)>").unwrap()
}

/// True if the text carries at least one parseable citation marker.
pub fn has_marker(text: &str) -> bool {
    marker_regex().is_match(text)
}

/// Extract every page number cited by markers embedded in `text`.
///
/// Accepts single pages, comma lists, and inclusive ranges (`5-7` yields
/// 5, 6, 7), in any combination within one marker. Result is sorted and
/// deduplicated; zero pages and backwards ranges are dropped.
pub fn extract_pages(text: &str) -> Vec<u32> {
    let mut pages = Vec::new();

    for cap in marker_regex().captures_iter(text) {
        let body = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        for segment in body.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if let Some((start, end)) = segment.split_once('-') {
                let start: Option<u32> = start.trim().parse().ok();
                let end: Option<u32> = end.trim().parse().ok();
                if let (Some(start), Some(end)) = (start, end) {
                    if start >= 1 && start <= end {
                        pages.extend(start..=end);
                    }
                }
            } else if let Ok(page) = segment.parse::<u32>() {
                if page >= 1 {
                    pages.push(page);
                }
            }
        }
    }

    pages.sort_unstable();
    pages.dedup();
    pages
}

/// Format a page set as the canonical comma-separated marker.
///
/// Caller guarantees `pages` is non-empty, sorted, and deduplicated (the
/// `Answer` constructor enforces this).
pub fn format_marker(pages: &[u32]) -> String {
    let list = pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("<PDF pg {list}>")
}

/// Replace every embedded marker with the canonical marker for `pages`.
///
/// If the text carries no marker at all, the marker is appended instead —
/// the answer keeps its citation either way.
pub fn rewrite_marker(text: &str, pages: &[u32]) -> String {
    let marker = format_marker(pages);
    if has_marker(text) {
        rewrite_markers_with(text, &marker)
    } else {
        format!("{} {marker}", text.trim_end())
    }
}

/// Replace every embedded marker with `replacement` verbatim.
///
/// With an empty replacement this strips markers, which is how the
/// similarity layer removes citations before tokenizing.
pub fn rewrite_markers_with(text: &str, replacement: &str) -> String {
    marker_regex().replace_all(text, replacement).to_string()
}
