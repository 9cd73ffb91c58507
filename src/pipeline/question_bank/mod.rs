//! Question bank loading and validation.
//!
//! Parses the declarative JSON bank into `QuestionBank`, rejecting dangling
//! section references and colliding ids before any processing starts —
//! continuing with a broken bank would silently drop questions.

pub mod types;

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

pub use types::{ExpectedType, Question, QuestionBank, Section};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Question bank JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Question bank has no sections")]
    NoSections,

    #[error("Duplicate section id: {0}")]
    DuplicateSectionId(String),

    #[error("Duplicate question id: {0}")]
    DuplicateQuestionId(String),

    #[error("Question {question_id} references unknown section: {section_id}")]
    UnknownSection {
        question_id: String,
        section_id: String,
    },

    #[error("Section has empty id")]
    EmptySectionId,

    #[error("Question in section {0} has empty id or text")]
    EmptyQuestion(String),
}

/// Wire shape of the question bank file.
#[derive(Debug, Deserialize)]
struct BankFile {
    sections: Vec<Section>,
}

/// Load and validate a question bank from its JSON source.
///
/// Validation is all-or-nothing: any structural problem fails the load and
/// therefore the run, per the fail-fast policy for configuration.
pub fn load(source: &str) -> Result<QuestionBank, ConfigError> {
    let file: BankFile = serde_json::from_str(source)?;

    if file.sections.is_empty() {
        return Err(ConfigError::NoSections);
    }

    let mut section_ids = HashSet::new();
    let mut question_ids = HashSet::new();

    for section in &file.sections {
        if section.id.trim().is_empty() {
            return Err(ConfigError::EmptySectionId);
        }
        if !section_ids.insert(section.id.clone()) {
            return Err(ConfigError::DuplicateSectionId(section.id.clone()));
        }
    }

    for section in &file.sections {
        for question in &section.questions {
            if question.id.trim().is_empty() || question.text.trim().is_empty() {
                return Err(ConfigError::EmptyQuestion(section.id.clone()));
            }
            if !question_ids.insert(question.id.clone()) {
                return Err(ConfigError::DuplicateQuestionId(question.id.clone()));
            }
            if !section_ids.contains(&question.section_id) {
                return Err(ConfigError::UnknownSection {
                    question_id: question.id.clone(),
                    section_id: question.section_id.clone(),
                });
            }
        }
    }

    let bank = QuestionBank::from_sections(file.sections);

    tracing::debug!(
        sections = bank.section_count(),
        questions = bank.question_count(),
        "Question bank loaded"
    );

    Ok(bank)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_BANK: &str = r#"{
        "sections": [
            {
                "id": "materials",
                "name": "Materials",
                "description": "Lining materials",
                "questions": [
                    {"id": "Q1", "text": "What resin type is specified?", "section_id": "materials", "required": true},
                    {"id": "Q2", "text": "What is the cure method?", "section_id": "materials", "expected_type": "text"}
                ]
            },
            {
                "id": "warranty",
                "name": "Warranty",
                "questions": [
                    {"id": "Q3", "text": "What warranty period applies?", "section_id": "warranty"}
                ]
            }
        ]
    }"#;

    #[test]
    fn loads_valid_bank() {
        let bank = load(VALID_BANK).unwrap();
        assert_eq!(bank.section_count(), 2);
        assert_eq!(bank.question_count(), 3);
        assert!(bank.question("Q2").is_some());
        assert!(bank.question("Q1").unwrap().required);
        assert!(!bank.question("Q2").unwrap().required);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = load("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn rejects_empty_bank() {
        let err = load(r#"{"sections": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NoSections));
    }

    #[test]
    fn rejects_dangling_section_reference() {
        let bank = r#"{
            "sections": [{
                "id": "materials", "name": "Materials",
                "questions": [{"id": "Q1", "text": "Resin?", "section_id": "ghost"}]
            }]
        }"#;
        let err = load(bank).unwrap_err();
        match err {
            ConfigError::UnknownSection {
                question_id,
                section_id,
            } => {
                assert_eq!(question_id, "Q1");
                assert_eq!(section_id, "ghost");
            }
            other => panic!("Expected UnknownSection, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_question_id() {
        let bank = r#"{
            "sections": [{
                "id": "s1", "name": "S1",
                "questions": [
                    {"id": "Q1", "text": "First?", "section_id": "s1"},
                    {"id": "Q1", "text": "Second?", "section_id": "s1"}
                ]
            }]
        }"#;
        let err = load(bank).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateQuestionId(id) if id == "Q1"));
    }

    #[test]
    fn rejects_duplicate_section_id() {
        let bank = r#"{
            "sections": [
                {"id": "s1", "name": "A", "questions": []},
                {"id": "s1", "name": "B", "questions": []}
            ]
        }"#;
        let err = load(bank).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSectionId(id) if id == "s1"));
    }

    #[test]
    fn rejects_blank_question_text() {
        let bank = r#"{
            "sections": [{
                "id": "s1", "name": "S1",
                "questions": [{"id": "Q1", "text": "   ", "section_id": "s1"}]
            }]
        }"#;
        let err = load(bank).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyQuestion(_)));
    }

    #[test]
    fn cross_section_reference_allowed_when_section_exists() {
        // Question placed inside s1 but claiming s2 ownership is legal as
        // long as s2 exists; the index keys by the declared section_id.
        let bank = r#"{
            "sections": [
                {"id": "s1", "name": "A", "questions": [
                    {"id": "Q1", "text": "Cross?", "section_id": "s2"}
                ]},
                {"id": "s2", "name": "B", "questions": []}
            ]
        }"#;
        let loaded = load(bank).unwrap();
        assert_eq!(loaded.question("Q1").unwrap().section_id, "s2");
    }
}
