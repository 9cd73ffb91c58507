//! Question bank data model.
//!
//! The bank is declarative JSON: ordered sections, each owning an ordered
//! list of questions. Sections drive expert-persona assignment; questions
//! are the atomic units the experts answer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What kind of value an answer is expected to carry.
///
/// Informational tag used by prompt construction and export views; the
/// pipeline never coerces answer text to the tagged type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedType {
    #[default]
    Text,
    Number,
    Boolean,
    List,
    Date,
}

impl ExpectedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Date => "date",
        }
    }
}

impl std::fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single question, stable across the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique id, e.g. "Q1". Stable for the whole run.
    pub id: String,
    pub text: String,
    /// Owning section id.
    pub section_id: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub expected_type: ExpectedType,
}

/// A document section: a named group of questions answered by one expert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
}

/// The loaded, validated question bank with id-keyed lookup maps.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    /// Sections in declaration order.
    pub sections: Vec<Section>,
    section_index: HashMap<String, usize>,
    question_index: HashMap<String, (usize, usize)>,
}

impl QuestionBank {
    /// Build the bank from validated sections. Indexes are built in one
    /// pass; callers go through `question_bank::load` which performs the
    /// validation first.
    pub(super) fn from_sections(sections: Vec<Section>) -> Self {
        let mut section_index = HashMap::new();
        let mut question_index = HashMap::new();

        for (si, section) in sections.iter().enumerate() {
            section_index.insert(section.id.clone(), si);
            for (qi, question) in section.questions.iter().enumerate() {
                question_index.insert(question.id.clone(), (si, qi));
            }
        }

        Self {
            sections,
            section_index,
            question_index,
        }
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.section_index
            .get(section_id)
            .map(|&si| &self.sections[si])
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.question_index
            .get(question_id)
            .map(|&(si, qi)| &self.sections[si].questions[qi])
    }

    /// All questions across all sections, in section declaration order.
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn question_count(&self) -> usize {
        self.question_index.len()
    }
}
