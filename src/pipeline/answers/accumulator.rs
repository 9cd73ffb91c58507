//! Cross-window answer accumulation with similarity-based deduplication.
//!
//! The accumulator exclusively owns the per-question variant lists. It is
//! fed from the sequential window loop only — never concurrently — so the
//! merge series per question is deterministic for a fixed answer sequence.
//! Nothing is ever removed: an incoming answer either merges into its best
//! match or is kept as a new variant. The system never assumes only one
//! truth per question.

use std::collections::BTreeMap;

use serde::Serialize;

use super::answer::Answer;
use super::similarity;

/// Per-run mapping from question id to its ordered answer variants.
pub type AnswerAccumulation = BTreeMap<String, Vec<Answer>>;

/// Counts for one `accumulate_window` call.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AccumulationDelta {
    /// Questions that received their first answer.
    pub new_answers: u32,
    /// Answers merged into an existing variant.
    pub merges: u32,
    /// Answers kept as additional variants.
    pub variants: u32,
}

/// Run-level accumulation statistics, for diagnostics only.
#[derive(Debug, Clone, Serialize)]
pub struct AccumulationStats {
    pub questions_answered: usize,
    /// Total stored variants across all questions.
    pub total_variants: usize,
    pub total_merges: u32,
    /// Confidence buckets: high >= 0.7, medium 0.4..0.7, low < 0.4.
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub unique_cited_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_span: Option<(u32, u32)>,
}

/// Merges per-window answer streams into the run's answer set.
pub struct SmartAccumulator {
    answers: AnswerAccumulation,
    similarity_threshold: f32,
    total_merges: u32,
}

impl SmartAccumulator {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            answers: BTreeMap::new(),
            similarity_threshold,
            total_merges: 0,
        }
    }

    /// Fold one window's validated answers into the accumulation.
    ///
    /// Per answer: first answer for a question is added as the sole entry;
    /// otherwise the best Jaccard match among existing variants decides —
    /// at or above the threshold the answer merges in place, below it the
    /// answer is appended as a new variant.
    pub fn accumulate_window(&mut self, answers: Vec<Answer>) -> AccumulationDelta {
        let mut delta = AccumulationDelta::default();

        for answer in answers {
            let variants = self.answers.entry(answer.question_id.clone()).or_default();

            if variants.is_empty() {
                delta.new_answers += 1;
                variants.push(answer);
                continue;
            }

            let (best_idx, best_score) = variants
                .iter()
                .enumerate()
                .map(|(i, existing)| (i, similarity::token_jaccard(&existing.text, &answer.text)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap_or((0, 0.0));

            if best_score >= self.similarity_threshold {
                tracing::debug!(
                    question_id = %answer.question_id,
                    similarity = best_score,
                    window = answer.window,
                    "Merging answer into existing variant"
                );
                variants[best_idx].merge_with(&answer);
                self.total_merges += 1;
                delta.merges += 1;
            } else {
                tracing::debug!(
                    question_id = %answer.question_id,
                    similarity = best_score,
                    window = answer.window,
                    "Keeping answer as new variant"
                );
                variants.push(answer);
                delta.variants += 1;
            }

            // Keep each variant list confidence-sorted so projections are
            // read-only.
            variants.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        delta
    }

    /// All variants per question, confidence-sorted descending.
    pub fn accumulated_answers(&self) -> &AnswerAccumulation {
        &self.answers
    }

    /// Highest-confidence variant per question.
    pub fn primary_answers(&self) -> BTreeMap<String, Answer> {
        self.answers
            .iter()
            .filter_map(|(id, variants)| variants.first().map(|a| (id.clone(), a.clone())))
            .collect()
    }

    pub fn has_answer(&self, question_id: &str) -> bool {
        self.answers
            .get(question_id)
            .is_some_and(|v| !v.is_empty())
    }

    /// Deduplicated footnotes across all variants, in accumulation order.
    pub fn footnotes(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut footnotes = Vec::new();
        for variants in self.answers.values() {
            for answer in variants {
                if let Some(note) = &answer.footnote {
                    if seen.insert(note.clone()) {
                        footnotes.push(note.clone());
                    }
                }
            }
        }
        footnotes
    }

    pub fn statistics(&self) -> AccumulationStats {
        let mut high = 0;
        let mut medium = 0;
        let mut low = 0;
        let mut pages = std::collections::BTreeSet::new();
        let mut total_variants = 0;

        for variants in self.answers.values() {
            total_variants += variants.len();
            for answer in variants {
                if answer.confidence >= 0.7 {
                    high += 1;
                } else if answer.confidence >= 0.4 {
                    medium += 1;
                } else {
                    low += 1;
                }
                pages.extend(answer.pages.iter().copied());
            }
        }

        let page_span = match (pages.first(), pages.last()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        };

        AccumulationStats {
            questions_answered: self.answers.values().filter(|v| !v.is_empty()).count(),
            total_variants,
            total_merges: self.total_merges,
            high_confidence: high,
            medium_confidence: medium,
            low_confidence: low,
            unique_cited_pages: pages.len(),
            page_span,
        }
    }
}
