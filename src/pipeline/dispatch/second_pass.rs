//! Second-pass processor — targeted re-analysis of unanswered questions.
//!
//! Runs after the full first sweep, against every window again, with the
//! enhanced prompt variant: inference from context allowed, partial
//! answers welcome, confidence floor lowered to the configured minimum.
//! A deliberate precision/recall trade-off specific to this pass.
//!
//! This pass operates outside the per-window accumulation loop, so when
//! the same question surfaces in two windows the answers merge here
//! immediately; the accumulator receives each recovered question once.

use std::collections::HashMap;

use crate::pipeline::answers::Answer;
use crate::pipeline::experts::PersonaRegistry;
use crate::pipeline::ingest::Window;
use crate::pipeline::question_bank::Question;

use super::processor::{ExpertDispatcher, PassSettings};

/// Everything the second pass recovered, plus its usage and failures.
#[derive(Debug, Default)]
pub struct SecondPassOutcome {
    /// One merged answer per recovered question id.
    pub answers: HashMap<String, Answer>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub errors: Vec<String>,
}

/// Re-scan all windows for the given unanswered questions.
///
/// A window where every expert fails is recorded and skipped — the pass
/// is best-effort recovery, not a correctness gate.
pub async fn process_unanswered(
    dispatcher: &ExpertDispatcher,
    windows: &[Window],
    unanswered: &[Question],
    registry: &PersonaRegistry,
    settings: &PassSettings,
) -> SecondPassOutcome {
    let mut outcome = SecondPassOutcome::default();

    if unanswered.is_empty() {
        return outcome;
    }

    tracing::info!(
        questions = unanswered.len(),
        windows = windows.len(),
        "Second pass: retrying unanswered questions"
    );

    for window in windows {
        match dispatcher
            .process_window(window, unanswered, registry, settings)
            .await
        {
            Ok(result) => {
                outcome.prompt_tokens += result.prompt_tokens;
                outcome.completion_tokens += result.completion_tokens;
                outcome.errors.extend(result.errors);

                for (question_id, answer) in result.answers {
                    match outcome.answers.get_mut(&question_id) {
                        Some(existing) => existing.merge_with(&answer),
                        None => {
                            outcome.answers.insert(question_id, answer);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    window = window.window_num,
                    error = %e,
                    "Second pass window failed — continuing"
                );
                outcome.errors.push(format!("window {}: {e}", window.window_num));
            }
        }
    }

    tracing::info!(
        recovered = outcome.answers.len(),
        of = unanswered.len(),
        "Second pass complete"
    );

    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AnalysisConfig;
    use crate::pipeline::dispatch::tests_support::{bank, window_over, CannedClient, FailingClient};

    fn unanswered_q3() -> Vec<Question> {
        bank()
            .all_questions()
            .filter(|q| q.id == "Q3")
            .cloned()
            .collect()
    }

    fn settings() -> PassSettings {
        PassSettings::second_pass(&AnalysisConfig::default())
    }

    #[tokio::test]
    async fn targets_only_unanswered_questions() {
        let client = Arc::new(CannedClient::new(r#"{"answers": []}"#));
        let dispatcher = ExpertDispatcher::new(client.clone(), 5, 4_096);
        let registry = PersonaRegistry::build(&bank());
        let windows = vec![window_over(&[1, 2, 3])];

        process_unanswered(&dispatcher, &windows, &unanswered_q3(), &registry, &settings()).await;

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1, "one expert owns Q3 in one window");
        assert!(prompts[0].contains("[Q3]"));
        assert!(!prompts[0].contains("[Q1]"), "answered questions must not be re-queried");
    }

    #[tokio::test]
    async fn answers_from_two_windows_merge_immediately() {
        // Same text each window; pages repaired to each window's first page.
        let client = Arc::new(CannedClient::new(
            r#"{"answers": [{"question_id": "Q3", "text": "implied ten year warranty <PDF pg 99>", "pages": [], "confidence": 0.5}]}"#,
        ));
        let dispatcher = ExpertDispatcher::new(client, 5, 4_096);
        let registry = PersonaRegistry::build(&bank());
        let windows = vec![window_over(&[1, 2, 3]), window_over(&[4, 5, 6])];

        let outcome =
            process_unanswered(&dispatcher, &windows, &unanswered_q3(), &registry, &settings())
                .await;

        assert_eq!(outcome.answers.len(), 1);
        let merged = &outcome.answers["Q3"];
        assert_eq!(merged.merge_count, 1);
        assert_eq!(merged.windows, vec![1, 2]);
        assert_eq!(merged.pages, vec![1, 4], "fallback first page per window");
    }

    #[tokio::test]
    async fn low_confidence_answers_stay_dropped() {
        let client = Arc::new(CannedClient::new(
            r#"{"answers": [{"question_id": "Q3", "text": "wild guess <PDF pg 1>", "pages": [1], "confidence": 0.2}]}"#,
        ));
        let dispatcher = ExpertDispatcher::new(client, 5, 4_096);
        let registry = PersonaRegistry::build(&bank());
        let windows = vec![window_over(&[1, 2, 3])];

        let outcome =
            process_unanswered(&dispatcher, &windows, &unanswered_q3(), &registry, &settings())
                .await;

        assert!(outcome.answers.is_empty(), "0.2 is below the 0.3 floor");
    }

    #[tokio::test]
    async fn failed_window_is_recorded_and_pass_continues() {
        let dispatcher = ExpertDispatcher::new(Arc::new(FailingClient), 5, 4_096);
        let registry = PersonaRegistry::build(&bank());
        let windows = vec![window_over(&[1, 2, 3]), window_over(&[4, 5, 6])];

        let outcome =
            process_unanswered(&dispatcher, &windows, &unanswered_q3(), &registry, &settings())
                .await;

        assert!(outcome.answers.is_empty());
        assert_eq!(outcome.errors.len(), 2, "both windows recorded");
    }

    #[tokio::test]
    async fn empty_unanswered_set_short_circuits() {
        let client = Arc::new(CannedClient::new(r#"{"answers": []}"#));
        let dispatcher = ExpertDispatcher::new(client.clone(), 5, 4_096);
        let registry = PersonaRegistry::build(&bank());
        let windows = vec![window_over(&[1, 2, 3])];

        let outcome =
            process_unanswered(&dispatcher, &windows, &[], &registry, &settings()).await;

        assert!(outcome.answers.is_empty());
        assert!(client.prompts.lock().unwrap().is_empty(), "no calls made");
    }

    #[tokio::test]
    async fn guardrails_reach_the_enhanced_prompt() {
        let client = Arc::new(CannedClient::new(r#"{"answers": []}"#));
        let dispatcher = ExpertDispatcher::new(client.clone(), 5, 4_096);
        let registry = PersonaRegistry::build(&bank());
        let windows = vec![window_over(&[1, 2, 3])];

        let config = AnalysisConfig {
            context_guardrails: Some("pipe lining context only".into()),
            ..Default::default()
        };
        let settings = PassSettings::second_pass(&config);

        process_unanswered(&dispatcher, &windows, &unanswered_q3(), &registry, &settings).await;

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("pipe lining context only"));
    }
}
