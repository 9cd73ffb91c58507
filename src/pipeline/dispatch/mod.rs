//! Expert dispatch — bounded concurrent model calls per window, response
//! parsing, and the second-pass retry.

pub mod parse;
pub mod processor;
pub mod second_pass;
pub mod traits;

#[cfg(test)]
pub mod tests_support;

use thiserror::Error;

pub use parse::AnswerOutcome;
pub use processor::{ExpertDispatcher, PassSettings, WindowResult};
pub use second_pass::SecondPassOutcome;
pub use traits::{ModelClient, ModelRequest, ModelResponse};

/// Failures of individual expert calls. Recovered locally — a window only
/// aborts when every one of its expert jobs failed.
#[derive(Error, Debug)]
pub enum ExpertCallError {
    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Expert {expert} returned malformed JSON: {reason}")]
    MalformedResponse { expert: String, reason: String },

    #[error("All {failed} expert calls failed for window {window}")]
    AllExpertsFailed { window: u32, failed: usize },
}
