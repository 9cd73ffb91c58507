//! Analysis run orchestrator.
//!
//! Single entry point that drives the full pipeline: ingest → window →
//! budget check → first pass → second pass → result snapshot. Windows are
//! processed strictly in order (window i+1 does not start until window
//! i's accumulation completed), so the accumulator sees answers in
//! document order and needs no locking. All per-run state (personas,
//! budget, accumulation) lives in this function's scope and dies with it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::pipeline::answers::{
    AccumulationStats, Answer, AnswerAccumulation, SmartAccumulator,
};
use crate::pipeline::budget::{TokenBudget, UsageStats};
use crate::pipeline::dispatch::{second_pass, ExpertDispatcher, ModelClient, PassSettings};
use crate::pipeline::experts::PersonaRegistry;
use crate::pipeline::ingest::{self, IngestionError, PageSource, Window};
use crate::pipeline::question_bank::{ConfigError, Question, QuestionBank};

/// Usage records from the second pass are booked under this pseudo-window.
const SECOND_PASS_WINDOW: u32 = 0;

/// Errors fatal to the whole run. Per-expert and per-window failures are
/// recovered into the result's error list instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Question bank error: {0}")]
    QuestionBank(#[from] ConfigError),

    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),
}

/// Progress notifications for the caller's transport (SSE, logs, tests).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        windows: u32,
        questions: u32,
    },
    WindowStarted {
        window: u32,
        of: u32,
    },
    WindowCompleted {
        window: u32,
        answers: u32,
        merges: u32,
        variants: u32,
    },
    SecondPassStarted {
        unanswered: u32,
    },
    Completed {
        questions_answered: u32,
        total_questions: u32,
    },
}

/// Final immutable snapshot of one analysis run.
#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub document_name: String,
    pub page_count: usize,
    pub window_count: usize,
    /// All variants per question, confidence-sorted descending.
    pub answers: AnswerAccumulation,
    /// Highest-confidence variant per question.
    pub primary_answers: BTreeMap<String, Answer>,
    pub footnotes: Vec<String>,
    pub accumulation: AccumulationStats,
    pub usage: UsageStats,
    pub questions_answered: usize,
    pub total_questions: usize,
    /// Questions the second pass recovered after the first sweep missed
    /// them.
    pub second_pass_recovered: usize,
    /// Window-level and per-answer failures, distinguished from genuinely
    /// unanswered questions.
    pub errors: Vec<String>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Orchestrates analysis runs. Pure pipeline logic with trait-based DI —
/// no transport, no file output.
pub struct AnalysisRunner {
    config: AnalysisConfig,
    client: Arc<dyn ModelClient>,
}

impl AnalysisRunner {
    pub fn new(config: AnalysisConfig, client: Arc<dyn ModelClient>) -> Self {
        Self { config, client }
    }

    /// Run the full pipeline over one document.
    ///
    /// `cancel` is honored between windows: the in-flight window's expert
    /// calls finish and its accumulation lands before the run stops, so no
    /// window is ever half-recorded.
    pub async fn run(
        &self,
        document_name: &str,
        source: &dyn PageSource,
        bank: &QuestionBank,
        cancel: Option<&AtomicBool>,
        progress: Option<&(dyn Fn(ProgressEvent) + Send + Sync)>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.config.validate().map_err(AnalysisError::Config)?;
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let pages = ingest::extract(source)?;
        let windows = ingest::build_windows(&pages, self.config.window_size);

        let questions: Vec<Question> = bank.all_questions().cloned().collect();
        let registry = PersonaRegistry::build(bank);
        let mut budget = TokenBudget::new(&self.config.model, self.config.budget_safety_factor);
        let mut accumulator = SmartAccumulator::new(self.config.similarity_threshold);
        let dispatcher = ExpertDispatcher::new(
            Arc::clone(&self.client),
            self.config.max_concurrent_experts,
            self.config.max_completion_tokens,
        );

        // Budget-check every window up front; both passes reuse the
        // effective (possibly truncated) text.
        let effective_windows: Vec<Window> = windows
            .iter()
            .map(|w| {
                let check = budget.check_window(w, questions.len());
                w.with_text(check.text)
            })
            .collect();

        tracing::info!(
            run_id = %run_id,
            document = document_name,
            pages = pages.len(),
            windows = effective_windows.len(),
            questions = questions.len(),
            "Analysis run starting"
        );

        emit(
            progress,
            ProgressEvent::Started {
                windows: effective_windows.len() as u32,
                questions: questions.len() as u32,
            },
        );

        let first_settings = PassSettings::first_pass(&self.config);
        let mut errors: Vec<String> = Vec::new();
        let mut cancelled = false;

        for window in &effective_windows {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                tracing::info!(
                    run_id = %run_id,
                    before_window = window.window_num,
                    "Run cancelled between windows"
                );
                cancelled = true;
                break;
            }

            emit(
                progress,
                ProgressEvent::WindowStarted {
                    window: window.window_num,
                    of: effective_windows.len() as u32,
                },
            );

            match dispatcher
                .process_window(window, &questions, &registry, &first_settings)
                .await
            {
                Ok(result) => {
                    budget.record_usage(
                        result.window_num,
                        result.prompt_tokens,
                        result.completion_tokens,
                    );
                    errors.extend(result.errors);

                    let mut answers: Vec<Answer> = result.answers.into_values().collect();
                    answers.sort_by(|a, b| a.question_id.cmp(&b.question_id));
                    let answer_count = answers.len() as u32;
                    let delta = accumulator.accumulate_window(answers);

                    emit(
                        progress,
                        ProgressEvent::WindowCompleted {
                            window: window.window_num,
                            answers: answer_count,
                            merges: delta.merges,
                            variants: delta.variants,
                        },
                    );
                }
                Err(e) => {
                    // The window is lost but the run keeps what it has —
                    // partial results always beat none.
                    tracing::warn!(
                        window = window.window_num,
                        error = %e,
                        "Window aborted — continuing with remaining windows"
                    );
                    errors.push(format!("window {}: {e}", window.window_num));
                }
            }
        }

        let mut second_pass_recovered = 0;
        if !cancelled {
            let unanswered: Vec<Question> = questions
                .iter()
                .filter(|q| !accumulator.has_answer(&q.id))
                .cloned()
                .collect();

            if !unanswered.is_empty() {
                emit(
                    progress,
                    ProgressEvent::SecondPassStarted {
                        unanswered: unanswered.len() as u32,
                    },
                );

                let second_settings = PassSettings::second_pass(&self.config);
                let outcome = second_pass::process_unanswered(
                    &dispatcher,
                    &effective_windows,
                    &unanswered,
                    &registry,
                    &second_settings,
                )
                .await;

                budget.record_usage(
                    SECOND_PASS_WINDOW,
                    outcome.prompt_tokens,
                    outcome.completion_tokens,
                );
                errors.extend(outcome.errors);
                second_pass_recovered = outcome.answers.len();

                let mut answers: Vec<Answer> = outcome.answers.into_values().collect();
                answers.sort_by(|a, b| a.question_id.cmp(&b.question_id));
                accumulator.accumulate_window(answers);
            }
        }

        let accumulation = accumulator.statistics();
        let questions_answered = accumulation.questions_answered;
        let total_questions = questions.len();

        emit(
            progress,
            ProgressEvent::Completed {
                questions_answered: questions_answered as u32,
                total_questions: total_questions as u32,
            },
        );

        tracing::info!(
            run_id = %run_id,
            answered = questions_answered,
            total = total_questions,
            recovered = second_pass_recovered,
            errors = errors.len(),
            cancelled,
            "Analysis run finished"
        );

        Ok(AnalysisResult {
            run_id,
            document_name: document_name.to_string(),
            page_count: pages.len(),
            window_count: effective_windows.len(),
            answers: accumulator.accumulated_answers().clone(),
            primary_answers: accumulator.primary_answers(),
            footnotes: accumulator.footnotes(),
            accumulation,
            usage: budget.statistics(),
            questions_answered,
            total_questions,
            second_pass_recovered,
            errors,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn emit(progress: Option<&(dyn Fn(ProgressEvent) + Send + Sync)>, event: ProgressEvent) {
    if let Some(f) = progress {
        f(event);
    }
}
