//! Run configuration for the analysis pipeline.

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Specsift";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// All tunables for one analysis run. Carried inside the run context —
/// never read from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Pages per window.
    pub window_size: usize,
    /// Fan-out limit for simultaneous expert calls within one window.
    pub max_concurrent_experts: usize,
    /// Jaccard threshold at or above which answers merge.
    pub similarity_threshold: f32,
    /// Model id the run targets (drives token limits and pricing).
    pub model: String,
    /// Ceiling passed as the completion-token parameter on every call.
    pub max_completion_tokens: u32,
    /// Fraction of the theoretical prompt maximum the budget governor
    /// recommends per call, leaving headroom for the concurrent fan-out.
    pub budget_safety_factor: f32,
    pub first_pass_temperature: f32,
    pub second_pass_temperature: f32,
    /// Confidence floor for second-pass answers. The first pass only
    /// drops exact zeros.
    pub second_pass_min_confidence: f32,
    /// Optional interpretation bounds injected into every second-pass
    /// prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_guardrails: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            max_concurrent_experts: 5,
            similarity_threshold: 0.75,
            model: "gpt-4o".into(),
            max_completion_tokens: 4_096,
            budget_safety_factor: 0.6,
            first_pass_temperature: 0.3,
            second_pass_temperature: 0.7,
            second_pass_min_confidence: 0.3,
            context_guardrails: None,
        }
    }
}

impl AnalysisConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be at least 1".into());
        }
        if self.max_concurrent_experts == 0 {
            return Err("max_concurrent_experts must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold {} outside [0, 1]",
                self.similarity_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.budget_safety_factor) {
            return Err(format!(
                "budget_safety_factor {} outside [0, 1]",
                self.budget_safety_factor
            ));
        }
        if !(0.0..=1.0).contains(&self.second_pass_min_confidence) {
            return Err(format!(
                "second_pass_min_confidence {} outside [0, 1]",
                self.second_pass_min_confidence
            ));
        }
        if self.model.trim().is_empty() {
            return Err("model must not be empty".into());
        }
        Ok(())
    }
}
