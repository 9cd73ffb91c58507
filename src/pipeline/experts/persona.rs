//! Expert persona generation — one domain-reviewer role per section.
//!
//! Personas are built once for the whole run and looked up through an
//! explicit `section_id → ExpertPersona` registry owned by the run context.
//! No generic fallback persona exists: the system prompt carries the hard
//! citation mandate the downstream validation depends on, and a watered-down
//! default would erode that contract silently.

use std::collections::HashMap;

use serde::Serialize;

use crate::pipeline::question_bank::{QuestionBank, Section};

/// A per-section reviewer role steering every model call for that section.
#[derive(Debug, Clone, Serialize)]
pub struct ExpertPersona {
    pub name: String,
    pub section_id: String,
    /// Full system instruction text, including the citation mandate and the
    /// structured-response schema.
    pub system_prompt: String,
    /// Extra citation instructions appended to every user prompt.
    pub citation_strategy: String,
}

const RESPONSE_SCHEMA_INSTRUCTION: &str = "\
Respond with a single JSON object and nothing else:\n\
{\"answers\": [{\"question_id\": \"...\", \"text\": \"...\", \"pages\": [..], \
\"confidence\": 0.0, \"reasoning\": \"...\"}]}\n\
Use the exact question ids you were given. If a question cannot be answered \
from the excerpt, set its text to \"NOT FOUND\".";

const CITATION_MANDATE: &str = "\
Every answer's text MUST end with a page citation marker of the form \
<PDF pg X> (for example <PDF pg 12> or <PDF pg 12, 13>), naming the page \
numbers the information was found on. This is non-negotiable: an answer \
without a citation marker is discarded. Prefer a partial or uncertain \
answer with a citation over no answer at all.";

/// Build the persona for one section.
pub fn generate(section: &Section) -> ExpertPersona {
    let name = format!("{} Review Expert", section.name.trim());

    let focus = if section.description.trim().is_empty() {
        section.name.clone()
    } else {
        section.description.clone()
    };

    let system_prompt = format!(
        "You are {name}, a senior reviewer of bid-specification documents. \
         Your specialty: {focus}. You answer a fixed set of questions about \
         the document excerpt you are shown, strictly from its text.\n\n\
         {CITATION_MANDATE}\n\n\
         {RESPONSE_SCHEMA_INSTRUCTION}"
    );

    let citation_strategy = format!(
        "Cite the page number printed in the excerpt for the section \
         '{}'. When information spans pages, cite every page involved.",
        section.name
    );

    ExpertPersona {
        name,
        section_id: section.id.clone(),
        system_prompt,
        citation_strategy,
    }
}

/// Explicit `section_id → ExpertPersona` map, built once at run start and
/// read-only afterwards.
#[derive(Debug)]
pub struct PersonaRegistry {
    personas: HashMap<String, ExpertPersona>,
}

impl PersonaRegistry {
    /// Generate personas for every section of the bank, up front.
    pub fn build(bank: &QuestionBank) -> Self {
        let personas = bank
            .sections
            .iter()
            .map(|section| (section.id.clone(), generate(section)))
            .collect();

        Self { personas }
    }

    pub fn get(&self, section_id: &str) -> Option<&ExpertPersona> {
        self.personas.get(section_id)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
