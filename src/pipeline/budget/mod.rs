//! Token budget governor — advisory sizing for window prompts plus running
//! usage and cost totals.
//!
//! The governor never blocks a window: it hands back possibly-shortened
//! text and a `within_budget` flag, and the caller decides to proceed. The
//! token estimate is the chars/4 heuristic, accurate within ~10% for BPE
//! tokenizers on English text.

use serde::Serialize;

use crate::pipeline::ingest::Window;

/// Estimated tokens a single rendered question adds to the prompt frame.
const TOKENS_PER_QUESTION: u32 = 40;

/// Known context/completion limits per model id.
#[derive(Debug, Clone, Copy)]
pub struct ModelLimits {
    pub context_window: u32,
    /// API-enforced ceiling on the completion-token parameter.
    pub max_completion_tokens: u32,
}

impl ModelLimits {
    /// Limits for a model id, with a conservative default for unknown ids.
    pub fn for_model(model: &str) -> Self {
        match model {
            m if m.starts_with("gpt-4o-mini") => Self {
                context_window: 128_000,
                max_completion_tokens: 16_384,
            },
            m if m.starts_with("gpt-4o") || m.starts_with("gpt-4.1") => Self {
                context_window: 128_000,
                max_completion_tokens: 16_384,
            },
            m if m.starts_with("gpt-4") => Self {
                context_window: 8_192,
                max_completion_tokens: 4_096,
            },
            _ => Self {
                context_window: 16_384,
                max_completion_tokens: 4_096,
            },
        }
    }
}

/// USD per 1K tokens. Unknown models price at zero — the total is a
/// diagnostic, never control flow.
#[derive(Debug, Clone, Copy, Default)]
struct ModelPricing {
    prompt_per_1k: f64,
    completion_per_1k: f64,
}

fn pricing_for(model: &str) -> ModelPricing {
    match model {
        m if m.starts_with("gpt-4o-mini") => ModelPricing {
            prompt_per_1k: 0.000_15,
            completion_per_1k: 0.000_6,
        },
        m if m.starts_with("gpt-4o") => ModelPricing {
            prompt_per_1k: 0.002_5,
            completion_per_1k: 0.01,
        },
        _ => ModelPricing::default(),
    }
}

/// Estimate the token count for a string. Heuristic: 1 token ≈ 4 chars,
/// rounding up.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    ((text.len() + 3) / 4) as u32
}

/// Advisory result for one window's prompt text.
#[derive(Debug, Clone)]
pub struct BudgetCheck {
    /// Window text, head-truncated if the estimate exceeded the ceiling.
    pub text: String,
    pub within_budget: bool,
    pub estimated_tokens: u32,
}

/// Recorded usage for one window.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WindowUsage {
    pub window_num: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Cumulative usage summary for the run.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub total_prompt_tokens: u32,
    pub total_completion_tokens: u32,
    pub total_tokens: u32,
    pub calls_recorded: u32,
    pub estimated_cost_usd: f64,
    pub per_window: Vec<WindowUsage>,
}

/// Per-run budget governor. Mutated only from the sequential window loop.
pub struct TokenBudget {
    limits: ModelLimits,
    pricing: ModelPricing,
    safety_factor: f32,
    usage: Vec<WindowUsage>,
}

impl TokenBudget {
    /// `safety_factor` (≈0.6) leaves headroom below the theoretical prompt
    /// maximum so N concurrent expert calls sharing one rate-limit budget
    /// do not collide with it.
    pub fn new(model: &str, safety_factor: f32) -> Self {
        Self {
            limits: ModelLimits::for_model(model),
            pricing: pricing_for(model),
            safety_factor,
            usage: Vec::new(),
        }
    }

    /// Ceiling of recommended prompt tokens per expert call.
    pub fn recommended_prompt_tokens(&self) -> u32 {
        let max_prompt = self
            .limits
            .context_window
            .saturating_sub(self.limits.max_completion_tokens);
        (max_prompt as f32 * self.safety_factor) as u32
    }

    /// Check one window's text against the per-call ceiling, shortening it
    /// if needed. Head-truncation keeps the leading pages and drops whole
    /// trailing pages where possible, so citations still map onto intact
    /// page text; only an oversized single page gets a raw character cut.
    pub fn check_window(&self, window: &Window, question_count: usize) -> BudgetCheck {
        let ceiling = self
            .recommended_prompt_tokens()
            .saturating_sub(question_count as u32 * TOKENS_PER_QUESTION);

        let estimated = estimate_tokens(&window.text);
        if estimated <= ceiling {
            return BudgetCheck {
                text: window.text.clone(),
                within_budget: true,
                estimated_tokens: estimated,
            };
        }

        let truncated = truncate_at_page_boundary(window, ceiling);
        let estimated_tokens = estimate_tokens(&truncated);

        tracing::warn!(
            window = window.window_num,
            estimated,
            ceiling,
            kept_tokens = estimated_tokens,
            "Window text exceeds prompt budget — truncated"
        );

        BudgetCheck {
            text: truncated,
            within_budget: false,
            estimated_tokens,
        }
    }

    /// Record the actual usage the model service reported for one call.
    pub fn record_usage(&mut self, window_num: u32, prompt_tokens: u32, completion_tokens: u32) {
        self.usage.push(WindowUsage {
            window_num,
            prompt_tokens,
            completion_tokens,
        });
    }

    pub fn statistics(&self) -> UsageStats {
        let total_prompt_tokens: u32 = self.usage.iter().map(|u| u.prompt_tokens).sum();
        let total_completion_tokens: u32 = self.usage.iter().map(|u| u.completion_tokens).sum();

        let estimated_cost_usd = total_prompt_tokens as f64 / 1000.0 * self.pricing.prompt_per_1k
            + total_completion_tokens as f64 / 1000.0 * self.pricing.completion_per_1k;

        UsageStats {
            total_prompt_tokens,
            total_completion_tokens,
            total_tokens: total_prompt_tokens + total_completion_tokens,
            calls_recorded: self.usage.len() as u32,
            estimated_cost_usd,
            per_window: self.usage.clone(),
        }
    }
}

/// Keep leading whole pages while the running estimate fits the ceiling.
/// Falls back to a raw character cut when even the first page is over.
fn truncate_at_page_boundary(window: &Window, ceiling: u32) -> String {
    let budget_chars = ceiling as usize * 4;

    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0usize;

    for page in &window.source_pages {
        // +2 for the blank-line joiner between pages.
        let cost = page.text.len() + if kept.is_empty() { 0 } else { 2 };
        if used + cost > budget_chars {
            break;
        }
        kept.push(page.text.as_str());
        used += cost;
    }

    if kept.is_empty() {
        let cut = window
            .text
            .char_indices()
            .take_while(|(i, _)| *i < budget_chars)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        return window.text[..cut].to_string();
    }

    kept.join("\n\n")
}
