//! The `Answer` entity — one expert's page-cited response to one question.
//!
//! Construction enforces the citation contract unconditionally: non-empty
//! positive page set, embedded `<PDF pg ...>` marker, confidence in [0,1].
//! These are data-quality gates, not warnings — an answer that fails them
//! never enters the accumulation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::citation;
use super::CitationViolation;

/// Multiplier the incoming text must exceed for its prose to replace the
/// existing text on merge. Length is a stated proxy for specificity, kept
/// deliberately: do not swap for a confidence-based tie-break without a
/// product decision.
pub const MERGE_LENGTH_RATIO: f32 = 1.2;

/// Separator used when two merged answers both carry footnotes.
const FOOTNOTE_SEPARATOR: &str = " | ";

/// A validated, page-cited answer. Mutated only by `merge_with`, and only
/// while owned by the accumulator (or the second pass, which merges
/// same-question answers before handing them over).
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question_id: String,
    /// Answer prose, always carrying at least one `<PDF pg ...>` marker.
    pub text: String,
    /// Cited pages: non-empty, positive, sorted, deduplicated.
    pub pages: Vec<u32>,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Name of the expert persona that produced the answer.
    pub expert: String,
    /// Window the answer originated from.
    pub window: u32,
    /// Every window that has contributed through merging.
    pub windows: Vec<u32>,
    pub merge_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footnote: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Answer {
    /// Construct a validated answer.
    ///
    /// `pages` is sorted and deduplicated here; all other invariants fail
    /// construction with a descriptive `CitationViolation`.
    pub fn new(
        question_id: impl Into<String>,
        text: impl Into<String>,
        pages: Vec<u32>,
        confidence: f32,
        expert: impl Into<String>,
        window: u32,
    ) -> Result<Self, CitationViolation> {
        let question_id = question_id.into();
        let text = text.into();

        if pages.is_empty() {
            return Err(CitationViolation::EmptyPages { question_id });
        }
        if let Some(&page) = pages.iter().find(|&&p| p == 0) {
            return Err(CitationViolation::InvalidPage { question_id, page });
        }
        if !citation::has_marker(&text) {
            return Err(CitationViolation::MissingMarker { question_id });
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CitationViolation::ConfidenceOutOfRange {
                question_id,
                confidence,
            });
        }

        let mut pages = pages;
        pages.sort_unstable();
        pages.dedup();

        let now = Utc::now();
        Ok(Self {
            question_id,
            text,
            pages,
            confidence,
            expert: expert.into(),
            window,
            windows: vec![window],
            merge_count: 0,
            footnote: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merge another answer for the same question into this one.
    ///
    /// Rules:
    /// - the other's text becomes base iff it is at least 1.2× longer
    ///   (length as a proxy for specificity);
    /// - pages are unioned, and the embedded marker is rewritten to the
    ///   canonical comma form over the union;
    /// - confidence takes the max of both sides;
    /// - footnotes are concatenated when both present and different;
    /// - `windows` becomes the sorted union, `merge_count` increments.
    pub fn merge_with(&mut self, other: &Answer) {
        debug_assert_eq!(self.question_id, other.question_id);

        let base_text = if other.text.len() as f32 >= self.text.len() as f32 * MERGE_LENGTH_RATIO {
            other.text.clone()
        } else {
            self.text.clone()
        };

        self.pages.extend(other.pages.iter().copied());
        self.pages.sort_unstable();
        self.pages.dedup();

        self.text = citation::rewrite_marker(&base_text, &self.pages);

        self.confidence = self.confidence.max(other.confidence);

        self.footnote = match (self.footnote.take(), other.footnote.clone()) {
            (Some(a), Some(b)) if a != b => Some(format!("{a}{FOOTNOTE_SEPARATOR}{b}")),
            (Some(a), _) => Some(a),
            (None, b) => b,
        };

        self.windows.extend(other.windows.iter().copied());
        self.windows.sort_unstable();
        self.windows.dedup();

        self.merge_count += 1;
        self.updated_at = Utc::now();
    }
}
