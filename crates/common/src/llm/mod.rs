//! Text-generation client abstraction
//!
//! Provides a unified interface for single-turn LLM completions:
//! - OpenAI-compatible chat-completions endpoint
//! - Scripted mock for development and testing

pub mod parse;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics::LlmCallMetrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// What a completion is used for; selects sampling settings and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmPurpose {
    Keywords,
    Relevance,
    Difficulty,
    Summary,
    ReferencePick,
    RelationExplanation,
}

impl LlmPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmPurpose::Keywords => "keywords",
            LlmPurpose::Relevance => "relevance",
            LlmPurpose::Difficulty => "difficulty",
            LlmPurpose::Summary => "summary",
            LlmPurpose::ReferencePick => "reference_pick",
            LlmPurpose::RelationExplanation => "relation_explanation",
        }
    }

    /// Sampling temperature and token budget
    pub fn settings(&self) -> (f32, u32) {
        match self {
            LlmPurpose::Keywords => (0.3, 256),
            LlmPurpose::Relevance | LlmPurpose::Difficulty => (0.0, 10),
            LlmPurpose::Summary => (0.2, 512),
            LlmPurpose::ReferencePick => (0.0, 128),
            LlmPurpose::RelationExplanation => (0.3, 512),
        }
    }
}

/// One stateless completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Overrides the client's configured system prompt
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub purpose: LlmPurpose,
}

impl CompletionRequest {
    /// Build a request using the purpose's default settings
    pub fn for_purpose(purpose: LlmPurpose, prompt: impl Into<String>) -> Self {
        let (temperature, max_tokens) = purpose.settings();
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature,
            max_tokens,
            purpose,
        }
    }
}

/// Trait for text generators
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a single prompt
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// OpenAI-compatible chat-completions client
pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

const SERVICE: &str = "llm";

impl ChatCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client, config })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let system = request
            .system_prompt
            .as_deref()
            .unwrap_or(&self.config.system_prompt);

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let timeout_ms = self.config.timeout().as_millis() as u64;
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_request(SERVICE, timeout_ms, e))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: response.status().as_u16(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::malformed(SERVICE, e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default().trim().to_string())
            .ok_or_else(|| AppError::malformed(SERVICE, "no choices in response"))
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let metrics = LlmCallMetrics::start(request.purpose.as_str());
        let result = self.send(request).await;
        metrics.finish(result.is_ok());

        if let Ok(text) = &result {
            debug!(
                purpose = request.purpose.as_str(),
                chars = text.len(),
                "LLM completion received"
            );
        }
        result
    }
}

enum Matcher {
    Marker(String),
    Purpose(LlmPurpose),
}

struct Rule {
    matcher: Matcher,
    /// `None` entries fail the call; the last entry repeats
    replies: VecDeque<Option<String>>,
}

#[derive(Default)]
struct MockState {
    rules: Vec<Rule>,
    calls: HashMap<LlmPurpose, usize>,
    prompts: Vec<(LlmPurpose, String)>,
}

/// Scripted text generator for development and testing.
///
/// Rules are checked in insertion order; the first rule whose marker
/// appears in the prompt (or whose purpose matches) answers. Unmatched
/// calls fail with an upstream error unless a default reply is set.
#[derive(Clone, Default)]
pub struct MockTextGenerator {
    state: Arc<Mutex<MockState>>,
    default_reply: Option<String>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` when the prompt contains `marker`
    pub fn on(self, marker: &str, response: &str) -> Self {
        self.push(Matcher::Marker(marker.to_string()), vec![Some(response.to_string())])
    }

    /// Reply with `response` for every call of the given purpose
    pub fn on_purpose(self, purpose: LlmPurpose, response: &str) -> Self {
        self.push(Matcher::Purpose(purpose), vec![Some(response.to_string())])
    }

    /// Reply with each response in turn for the given purpose, repeating the last
    pub fn sequence(self, purpose: LlmPurpose, responses: &[&str]) -> Self {
        let replies = responses.iter().map(|r| Some(r.to_string())).collect();
        self.push(Matcher::Purpose(purpose), replies)
    }

    /// Fail every call of the given purpose
    pub fn fail_purpose(self, purpose: LlmPurpose) -> Self {
        self.push(Matcher::Purpose(purpose), vec![None])
    }

    pub fn with_default(mut self, response: &str) -> Self {
        self.default_reply = Some(response.to_string());
        self
    }

    fn push(self, matcher: Matcher, replies: Vec<Option<String>>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.rules.push(Rule {
                matcher,
                replies: replies.into(),
            });
        }
        self
    }

    /// Number of calls made for a purpose
    pub fn calls(&self, purpose: LlmPurpose) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.get(&purpose).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.values().sum())
            .unwrap_or(0)
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<(LlmPurpose, String)> {
        self.state.lock().map(|s| s.prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut state = self.state.lock().map_err(|_| AppError::Internal {
            message: "mock generator lock poisoned".to_string(),
        })?;

        *state.calls.entry(request.purpose).or_insert(0) += 1;
        state
            .prompts
            .push((request.purpose, request.prompt.clone()));

        let rule = state.rules.iter_mut().find(|rule| match &rule.matcher {
            Matcher::Marker(marker) => request.prompt.contains(marker.as_str()),
            Matcher::Purpose(purpose) => *purpose == request.purpose,
        });

        let reply = match rule {
            Some(rule) if rule.replies.len() > 1 => rule.replies.pop_front().flatten(),
            Some(rule) => rule.replies.front().cloned().flatten(),
            None => self.default_reply.clone(),
        };

        reply.ok_or_else(|| AppError::Upstream {
            service: SERVICE.to_string(),
            message: format!("scripted failure for {}", request.purpose.as_str()),
        })
    }
}
