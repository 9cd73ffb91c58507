//! Lexical answer similarity: normalized-token Jaccard overlap.
//!
//! Citation markers are recognized and excluded from the token sets before
//! comparison — two answers citing different pages are not less similar for
//! it, and identical markers must not inflate the overlap either.
//!
//! Token-based Jaccard is a deliberate simplification — it keeps merge
//! outcomes deterministic and explainable. Future enhancement: sentence
//! embeddings, which would change merge outcomes and the threshold
//! calibration, so any upgrade has to be explicit.

use super::citation;

/// Normalize answer text for comparison: lowercase, collapse whitespace,
/// strip punctuation except digits and angle brackets.
///
/// Angle brackets and digits survive punctuation stripping so citation
/// markers keep their shape and can be recognized (and excluded) before
/// tokenization.
pub fn normalize(text: &str) -> String {
    let filtered: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '<' || c == '>' {
                c
            } else {
                ' '
            }
        })
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity over the normalized, marker-stripped token sets of
/// two answer texts.
///
/// Returns 1.0 when the normalized strings are identical, 0.0 when either
/// token set is empty. Symmetric by construction.
pub fn token_jaccard(a: &str, b: &str) -> f32 {
    let norm_a = normalize(&strip_markers(a));
    let norm_b = normalize(&strip_markers(b));

    if norm_a == norm_b && !norm_a.is_empty() {
        return 1.0;
    }

    let tokens_a: std::collections::HashSet<&str> = norm_a.split_whitespace().collect();
    let tokens_b: std::collections::HashSet<&str> = norm_b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    intersection as f32 / union as f32
}

fn strip_markers(text: &str) -> String {
    citation::rewrite_markers_with(text, "")
}
