//! Expert response parsing: structured JSON → validated answer outcomes.
//!
//! The read contract is lenient where models drift (fenced code blocks,
//! missing `pages`, integer confidences) and strict where it matters: an
//! answer with no recoverable page citation is rejected outright.

use serde::Deserialize;

use crate::pipeline::answers::{citation, Answer};
use crate::pipeline::ingest::Window;

use super::ExpertCallError;

/// Tagged per-question outcome of one expert call, so the window loop's
/// skip / record / reject decisions are explicit matches instead of
/// exception-type inspection.
#[derive(Debug)]
pub enum AnswerOutcome {
    Found(Answer),
    /// The expert looked and found nothing. No information gained, not an
    /// error.
    NotFound { question_id: String },
    /// The answer was unusable (citation contract breach, bad confidence).
    Rejected { question_id: String, reason: String },
}

/// Wire shape of one expert's structured response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    answers: Vec<WireAnswer>,
}

#[derive(Debug, Deserialize)]
struct WireAnswer {
    question_id: String,
    text: String,
    /// May arrive empty; repaired from embedded markers where possible.
    #[serde(default)]
    pages: Vec<u32>,
    confidence: f32,
    /// Informational only; never validated.
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: Option<String>,
}

/// Parse one expert's raw response for one window into per-question
/// outcomes.
///
/// Malformed JSON fails the whole call (the caller records it and moves
/// on); individual bad answers degrade to `Rejected` outcomes without
/// touching their siblings.
pub fn parse_expert_response(
    raw: &str,
    expert: &str,
    window: &Window,
    min_confidence: f32,
) -> Result<Vec<AnswerOutcome>, ExpertCallError> {
    let body = strip_code_fence(raw);

    let wire: WireResponse =
        serde_json::from_str(body).map_err(|e| ExpertCallError::MalformedResponse {
            expert: expert.to_string(),
            reason: e.to_string(),
        })?;

    Ok(wire
        .answers
        .into_iter()
        .map(|answer| validate_answer(answer, expert, window, min_confidence))
        .collect())
}

/// Validate and repair a single wire answer into an outcome.
fn validate_answer(
    wire: WireAnswer,
    expert: &str,
    window: &Window,
    min_confidence: f32,
) -> AnswerOutcome {
    let question_id = wire.question_id;

    // "NOT FOUND" and zero confidence both mean no information gained.
    if wire.text.trim().eq_ignore_ascii_case("NOT FOUND") || wire.confidence == 0.0 {
        return AnswerOutcome::NotFound { question_id };
    }
    if wire.confidence < min_confidence {
        tracing::debug!(
            question_id = %question_id,
            confidence = wire.confidence,
            min_confidence,
            "Answer below confidence floor — treated as not found"
        );
        return AnswerOutcome::NotFound { question_id };
    }

    // Emergency extraction: an empty pages field can often be recovered
    // from markers the model embedded in the text anyway.
    let mut pages = wire.pages;
    pages.retain(|&p| p >= 1);
    if pages.is_empty() {
        pages = citation::extract_pages(&wire.text);
    }
    if pages.is_empty() {
        tracing::error!(
            question_id = %question_id,
            expert,
            window = window.window_num,
            "Answer has no recoverable page citation — rejected"
        );
        return AnswerOutcome::Rejected {
            question_id,
            reason: "no recoverable page citation".into(),
        };
    }

    // Cited pages must belong to the window that produced the answer.
    // Falling back to the window's first page is a deliberate, visible
    // degradation rather than a silent failure.
    let in_window: Vec<u32> = pages
        .iter()
        .copied()
        .filter(|&p| window.contains_page(p))
        .collect();
    let pages = if in_window.is_empty() {
        tracing::warn!(
            question_id = %question_id,
            cited = ?pages,
            window = window.window_num,
            fallback = window.first_page(),
            "No cited page belongs to the window — falling back to first page"
        );
        vec![window.first_page()]
    } else {
        in_window
    };

    // Synthesize the marker when the model cited pages only in the field.
    let text = if citation::has_marker(&wire.text) {
        wire.text
    } else {
        format!(
            "{} {}",
            wire.text.trim_end(),
            citation::format_marker(&pages)
        )
    };

    match Answer::new(
        question_id.clone(),
        text,
        pages,
        wire.confidence,
        expert,
        window.window_num,
    ) {
        Ok(answer) => AnswerOutcome::Found(answer),
        Err(violation) => {
            tracing::error!(
                question_id = %question_id,
                expert,
                error = %violation,
                "Answer failed citation validation — rejected"
            );
            AnswerOutcome::Rejected {
                question_id,
                reason: violation.to_string(),
            }
        }
    }
}

/// Strip a surrounding ```json fence if the model wrapped its payload.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
