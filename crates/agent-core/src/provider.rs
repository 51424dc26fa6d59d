//! LLM Provider Strategy Pattern
//!
//! Common interface for chat-completion backends, plus `TracedProvider`,
//! a decorator that reports every invocation to registered observers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, TracedProvider};
//!
//! let tracer = Arc::new(CostTracer::new());
//! let provider = TracedProvider::new(Arc::new(OpenAiProvider::from_env()?))
//!     .observe(tracer.clone());
//!
//! let response = provider.complete(&messages, &options).await?;
//! println!("{}", tracer.totals().cost_usd);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::message::{self, Message};

/// Configuration for LLM generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4o-mini")
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic)
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_max_tokens() -> u32 {
    256
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Provider request identifier (if available)
    pub request_id: Option<String>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,

    /// Provider response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// No prompt or completion tokens reported; treated the same as absent
    /// usage even when a bare `total_tokens` is present
    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// Strategy trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name used in trace events
    fn name(&self) -> &str;

    /// Generate a completion from messages
    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion>;

    /// Estimate token count for text
    fn estimate_tokens(&self, text: &str) -> u32 {
        message::estimate_tokens(text)
    }
}

// ============================================================================
// Invocation events
// ============================================================================

/// Identifier of one LLM invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider response as seen by observers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Model reported by the provider
    pub model: Option<String>,

    pub request_id: Option<String>,

    /// Reported usage; absent or zero usage is estimated by consumers
    pub usage: Option<TokenUsage>,

    /// Generated text
    pub output_text: String,

    /// Provider payload kept for diagnostics
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl From<&Completion> for LlmResponse {
    fn from(completion: &Completion) -> Self {
        Self {
            model: Some(completion.model.clone()).filter(|m| !m.is_empty()),
            request_id: completion.request_id.clone(),
            usage: completion.usage,
            output_text: completion.content.clone(),
            raw: completion.raw.clone().unwrap_or_default(),
        }
    }
}

/// Listener for LLM invocation lifecycle events
pub trait InvocationObserver: Send + Sync {
    /// Text-completion invocation started
    fn on_llm_start(&self, run_id: RunId, parent_run_id: Option<RunId>, name: &str, prompts: &[String]);

    /// Chat invocation started
    fn on_chat_model_start(
        &self,
        run_id: RunId,
        parent_run_id: Option<RunId>,
        name: &str,
        conversations: &[Vec<Message>],
    );

    fn on_llm_end(&self, run_id: RunId, response: &LlmResponse);

    fn on_llm_error(&self, run_id: RunId, error: &str);
}

/// Provider decorator emitting invocation events
pub struct TracedProvider {
    inner: Arc<dyn LlmProvider>,
    observers: Vec<Arc<dyn InvocationObserver>>,
    parent_run_id: Option<RunId>,
}

impl TracedProvider {
    pub fn new(inner: Arc<dyn LlmProvider>) -> Self {
        Self {
            inner,
            observers: Vec::new(),
            parent_run_id: None,
        }
    }

    pub fn observe(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Attribute every invocation to an enclosing run
    pub fn with_parent(mut self, parent_run_id: RunId) -> Self {
        self.parent_run_id = Some(parent_run_id);
        self
    }
}

#[async_trait]
impl LlmProvider for TracedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let run_id = RunId::new();
        let conversations = [messages.to_vec()];
        for observer in &self.observers {
            observer.on_chat_model_start(run_id, self.parent_run_id, self.inner.name(), &conversations);
        }

        match self.inner.complete(messages, options).await {
            Ok(completion) => {
                let response = LlmResponse::from(&completion);
                for observer in &self.observers {
                    observer.on_llm_end(run_id, &response);
                }
                Ok(completion)
            }
            Err(e) => {
                tracing::warn!(%run_id, provider = self.inner.name(), error = %e, "LLM invocation failed");
                let message = e.to_string();
                for observer in &self.observers {
                    observer.on_llm_error(run_id, &message);
                }
                Err(e)
            }
        }
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        self.inner.estimate_tokens(text)
    }
}
