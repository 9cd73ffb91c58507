//! Multi-expert window processor — bounded concurrent fan-out of expert
//! calls for one window.
//!
//! One job per expert persona with outstanding questions in the window.
//! Jobs run under a counting semaphore (default 5 permits) to respect
//! upstream rate limits; results drain through an mpsc channel and the
//! window completes at the join barrier. Expert jobs target disjoint
//! question sets, so no synchronization beyond the gate is needed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};

use crate::config::AnalysisConfig;
use crate::pipeline::answers::Answer;
use crate::pipeline::experts::{prompts, PersonaRegistry};
use crate::pipeline::ingest::Window;
use crate::pipeline::question_bank::Question;

use super::parse::{self, AnswerOutcome};
use super::traits::{ModelClient, ModelRequest};
use super::ExpertCallError;

/// Prompt/gating parameters for one pass over the document.
#[derive(Debug, Clone)]
pub struct PassSettings {
    pub temperature: f32,
    /// Answers strictly below this floor degrade to NotFound.
    pub min_confidence: f32,
    /// Use the enhanced (inference-permitted) prompt variant.
    pub enhanced: bool,
    pub guardrails: Option<String>,
}

impl PassSettings {
    /// Strict first sweep: factual precision, only exact zeros dropped.
    pub fn first_pass(config: &AnalysisConfig) -> Self {
        Self {
            temperature: config.first_pass_temperature,
            min_confidence: 0.0,
            enhanced: false,
            guardrails: None,
        }
    }

    /// Recall-favoring retry for unanswered questions.
    pub fn second_pass(config: &AnalysisConfig) -> Self {
        Self {
            temperature: config.second_pass_temperature,
            min_confidence: config.second_pass_min_confidence,
            enhanced: true,
            guardrails: config.context_guardrails.clone(),
        }
    }
}

/// Everything one window's dispatch produced.
#[derive(Debug, Default)]
pub struct WindowResult {
    pub window_num: u32,
    /// One validated answer per question id. Disjoint by construction:
    /// each question belongs to exactly one expert per window.
    pub answers: HashMap<String, Answer>,
    /// Questions the experts explicitly found nothing for.
    pub not_found: Vec<String>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub duration_ms: u64,
    /// Per-expert call failures and per-answer rejections. Retained for
    /// diagnostics, never swallowed.
    pub errors: Vec<String>,
}

impl WindowResult {
    pub fn tokens_used(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

struct ExpertJob {
    persona: crate::pipeline::experts::ExpertPersona,
    questions: Vec<Question>,
}

/// Dispatches expert calls for windows. Holds the model client and the
/// fan-out limit; one instance serves both passes.
pub struct ExpertDispatcher {
    client: Arc<dyn ModelClient>,
    max_concurrent: usize,
    max_completion_tokens: u32,
}

impl ExpertDispatcher {
    pub fn new(
        client: Arc<dyn ModelClient>,
        max_concurrent: usize,
        max_completion_tokens: u32,
    ) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
            max_completion_tokens,
        }
    }

    /// Process one window: group questions by section, fan out one call
    /// per expert, validate every answer.
    ///
    /// Individual expert failures are recorded and the window continues;
    /// only a window where every job failed errors out.
    pub async fn process_window(
        &self,
        window: &Window,
        questions: &[Question],
        registry: &PersonaRegistry,
        settings: &PassSettings,
    ) -> Result<WindowResult, ExpertCallError> {
        let start = Instant::now();

        let mut result = WindowResult {
            window_num: window.window_num,
            ..Default::default()
        };

        let jobs = self.plan_jobs(questions, registry, &mut result.errors);
        if jobs.is_empty() {
            result.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }
        let job_count = jobs.len();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (tx, mut rx) = mpsc::channel(job_count);

        for job in jobs {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let window = window.clone();
            let settings = settings.clone();
            let max_completion_tokens = self.max_completion_tokens;

            tokio::spawn(async move {
                // Acquire fan-out permit
                let _permit = semaphore.acquire().await;

                let question_refs: Vec<&Question> = job.questions.iter().collect();
                let user_prompt = if settings.enhanced {
                    prompts::second_pass_prompt(
                        &job.persona,
                        &window,
                        &question_refs,
                        settings.guardrails.as_deref(),
                    )
                } else {
                    prompts::first_pass_prompt(&job.persona, &window, &question_refs)
                };

                let request = ModelRequest {
                    system_prompt: job.persona.system_prompt.clone(),
                    user_prompt,
                    temperature: settings.temperature,
                    max_completion_tokens,
                    expect_json: true,
                };

                let outcome = match client.call(request).await {
                    Ok(response) => parse::parse_expert_response(
                        &response.text,
                        &job.persona.name,
                        &window,
                        settings.min_confidence,
                    )
                    .map(|outcomes| {
                        (outcomes, response.prompt_tokens, response.completion_tokens)
                    }),
                    Err(e) => Err(e),
                };

                let _ = tx.send((job.persona.name.clone(), outcome)).await;
            });
        }
        drop(tx);

        let mut failed_jobs = 0usize;
        while let Some((expert, outcome)) = rx.recv().await {
            match outcome {
                Ok((outcomes, prompt_tokens, completion_tokens)) => {
                    result.prompt_tokens += prompt_tokens;
                    result.completion_tokens += completion_tokens;
                    for outcome in outcomes {
                        match outcome {
                            AnswerOutcome::Found(answer) => {
                                result.answers.insert(answer.question_id.clone(), answer);
                            }
                            AnswerOutcome::NotFound { question_id } => {
                                result.not_found.push(question_id);
                            }
                            AnswerOutcome::Rejected {
                                question_id,
                                reason,
                            } => {
                                result.errors.push(format!("{question_id}: {reason}"));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        expert = %expert,
                        window = window.window_num,
                        error = %e,
                        "Expert call failed — continuing with remaining experts"
                    );
                    failed_jobs += 1;
                    result.errors.push(format!("{expert}: {e}"));
                }
            }
        }

        if failed_jobs == job_count {
            return Err(ExpertCallError::AllExpertsFailed {
                window: window.window_num,
                failed: failed_jobs,
            });
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            window = window.window_num,
            answers = result.answers.len(),
            not_found = result.not_found.len(),
            errors = result.errors.len(),
            tokens = result.tokens_used(),
            "Window dispatched"
        );

        Ok(result)
    }

    /// Deterministic grouping: one job per section with outstanding
    /// questions, in section-id order.
    fn plan_jobs(
        &self,
        questions: &[Question],
        registry: &PersonaRegistry,
        errors: &mut Vec<String>,
    ) -> Vec<ExpertJob> {
        let mut by_section: BTreeMap<String, Vec<Question>> = BTreeMap::new();
        for question in questions {
            by_section
                .entry(question.section_id.clone())
                .or_default()
                .push(question.clone());
        }

        let mut jobs = Vec::with_capacity(by_section.len());
        for (section_id, questions) in by_section {
            match registry.get(&section_id) {
                Some(persona) => jobs.push(ExpertJob {
                    persona: persona.clone(),
                    questions,
                }),
                None => {
                    // Unreachable after bank validation, but a missing
                    // persona must not take the window down.
                    errors.push(format!("no expert persona for section {section_id}"));
                }
            }
        }
        jobs
    }
}
