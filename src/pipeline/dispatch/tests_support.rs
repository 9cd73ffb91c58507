//! Shared mock model clients and fixtures for dispatch tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::pipeline::ingest::{Page, Window};
use crate::pipeline::question_bank::{self, QuestionBank};

use super::traits::{ModelClient, ModelRequest, ModelResponse};
use super::ExpertCallError;

/// Two-section bank: materials (Q1, Q2) and warranty (Q3).
pub fn bank() -> QuestionBank {
    question_bank::load(
        r#"{
            "sections": [
                {"id": "materials", "name": "Materials", "description": "Lining materials", "questions": [
                    {"id": "Q1", "text": "What resin type is specified?", "section_id": "materials"},
                    {"id": "Q2", "text": "What is the minimum wall thickness?", "section_id": "materials"}
                ]},
                {"id": "warranty", "name": "Warranty", "questions": [
                    {"id": "Q3", "text": "What warranty period applies?", "section_id": "warranty"}
                ]}
            ]
        }"#,
    )
    .unwrap()
}

/// Window number derived from the first page: pages 1-3 → window 1,
/// pages 4-6 → window 2, matching size-3 windowing.
pub fn window_over(pages: &[u32]) -> Window {
    let first = pages[0];
    Window {
        window_num: (first - 1) / 3 + 1,
        pages: pages.to_vec(),
        text: format!("Excerpt covering pages {pages:?}"),
        source_pages: pages
            .iter()
            .map(|&n| Page::new(n, format!("Page {n} content")))
            .collect(),
    }
}

enum SectionBehavior {
    Answer,
    Fail,
    Garbage,
}

/// Mock that answers per persona, with a configurable misbehaving section.
pub struct MockModelClient {
    bad_section: Option<String>,
    behavior: SectionBehavior,
}

impl MockModelClient {
    pub fn per_section() -> Self {
        Self {
            bad_section: None,
            behavior: SectionBehavior::Answer,
        }
    }

    pub fn failing_for_section(section: &str) -> Self {
        Self {
            bad_section: Some(section.to_lowercase()),
            behavior: SectionBehavior::Fail,
        }
    }

    pub fn garbage_for_section(section: &str) -> Self {
        Self {
            bad_section: Some(section.to_lowercase()),
            behavior: SectionBehavior::Garbage,
        }
    }

    fn is_bad(&self, request: &ModelRequest) -> bool {
        self.bad_section
            .as_deref()
            .is_some_and(|s| request.system_prompt.to_lowercase().contains(s))
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, ExpertCallError> {
        if self.is_bad(&request) {
            match self.behavior {
                SectionBehavior::Fail => {
                    return Err(ExpertCallError::ModelCall("simulated outage".into()))
                }
                SectionBehavior::Garbage => {
                    return Ok(ModelResponse {
                        text: "I'm sorry, I can't produce JSON today.".into(),
                        prompt_tokens: 100,
                        completion_tokens: 20,
                    })
                }
                SectionBehavior::Answer => {}
            }
        }

        let body = if request.system_prompt.contains("Materials") {
            r#"{"answers": [
                {"question_id": "Q1", "text": "polyester resin <PDF pg 1>", "pages": [1], "confidence": 0.8},
                {"question_id": "Q2", "text": "wall thickness 6 mm <PDF pg 2>", "pages": [2], "confidence": 0.7}
            ]}"#
        } else {
            r#"{"answers": [
                {"question_id": "Q3", "text": "warranty is 10 years <PDF pg 3>", "pages": [3], "confidence": 0.9}
            ]}"#
        };

        Ok(ModelResponse {
            text: body.into(),
            prompt_tokens: 100,
            completion_tokens: 20,
        })
    }
}

/// Always errors — simulates a full service outage.
pub struct FailingClient;

#[async_trait]
impl ModelClient for FailingClient {
    async fn call(&self, _request: ModelRequest) -> Result<ModelResponse, ExpertCallError> {
        Err(ExpertCallError::ModelCall("service unavailable".into()))
    }
}

/// Returns the same canned payload for every call and records each user
/// prompt for assertions.
pub struct CannedClient {
    response: String,
    pub prompts: std::sync::Mutex<Vec<String>>,
}

impl CannedClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelClient for CannedClient {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, ExpertCallError> {
        self.prompts.lock().unwrap().push(request.user_prompt);
        Ok(ModelResponse {
            text: self.response.clone(),
            prompt_tokens: 50,
            completion_tokens: 10,
        })
    }
}

/// Tracks the high-water mark of concurrent in-flight calls.
pub struct CountingClient {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl CountingClient {
    pub fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
        }
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for CountingClient {
    async fn call(&self, _request: ModelRequest) -> Result<ModelResponse, ExpertCallError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ModelResponse {
            text: r#"{"answers": []}"#.into(),
            prompt_tokens: 10,
            completion_tokens: 2,
        })
    }
}
