//! Answer model, citation contract, and cross-window accumulation.

pub mod accumulator;
pub mod answer;
pub mod citation;
pub mod similarity;

use thiserror::Error;

pub use accumulator::{AccumulationDelta, AccumulationStats, AnswerAccumulation, SmartAccumulator};
pub use answer::Answer;

/// Breach of the mandatory citation contract on a single answer.
///
/// Always a hard failure for that answer — it indicates the expert broke
/// the prompt contract, not a transient transport problem, and is logged
/// separately from ordinary parse failures.
#[derive(Error, Debug)]
pub enum CitationViolation {
    #[error("Answer for {question_id} has no cited pages after repair")]
    EmptyPages { question_id: String },

    #[error("Answer for {question_id} cites invalid page number {page}")]
    InvalidPage { question_id: String, page: u32 },

    #[error("Answer for {question_id} carries no <PDF pg ...> marker")]
    MissingMarker { question_id: String },

    #[error("Answer for {question_id} has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { question_id: String, confidence: f32 },
}
