//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` over the chat-completions endpoint.
//! Works against any server speaking the same protocol (set
//! `OPENAI_BASE_URL`).

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer credential
    pub api_key: String,

    /// API root, without trailing `/chat/completions`
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 60,
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_TIMEOUT_SECS`.
    ///
    /// A missing or blank key is an [`AgentError::Auth`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Auth("OPENAI_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Some(base_url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = lookup("OPENAI_TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .parse()
                .map_err(|_| AgentError::Config(format!("OPENAI_TIMEOUT_SECS is not a number: {timeout}")))?;
        }
        Ok(config)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Convert agent messages to wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    // Tool results travel as plain user context in the text protocol
                    Role::Tool => "user",
                },
                content: &m.content,
            })
            .collect()
    }

    /// Convert a response body to an agent completion
    fn convert_completion(body: Value, requested_model: &str) -> Result<Completion> {
        let response: ChatResponse = serde_json::from_value(body.clone())
            .map_err(|e| AgentError::Provider(format!("unexpected response shape: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response has no choices".into()))?;

        let finish_reason = choice.finish_reason.as_deref().map(|r| match r {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        });

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: if u.total_tokens == 0 {
                    u.prompt_tokens.saturating_add(u.completion_tokens)
                } else {
                    u.total_tokens
                },
            }),
            request_id: response.id,
            finish_reason,
            raw: Some(body),
        })
    }

    fn status_error(status: reqwest::StatusCode, body: &str) -> AgentError {
        let detail = format!("{status}: {body}");
        match status.as_u16() {
            401 | 403 => AgentError::Auth(detail),
            429 | 500..=599 => AgentError::ProviderUnavailable(detail),
            _ => AgentError::Provider(detail),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let request = ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: (!options.stop_sequences.is_empty()).then_some(options.stop_sequences.as_slice()),
        };

        tracing::debug!(model = %options.model, messages = messages.len(), "chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "chat completion rejected");
            return Err(Self::status_error(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Self::convert_completion(body, &options.model)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_from_lookup() {
        let config = OpenAiConfig::from_lookup(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout_secs, 60);
        assert!(!format!("{config:?}").contains("sk-test"));
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let err = OpenAiConfig::from_lookup(env(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::tool("[Tool 'x' returned]", None),
        ];

        let converted = OpenAiProvider::convert_messages(&messages);
        let roles: Vec<_> = converted.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "user"]);
    }

    #[test]
    fn test_completion_conversion() {
        let body = json!({
            "id": "chatcmpl-abc",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "Hola"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let completion = OpenAiProvider::convert_completion(body, "gpt-4o-mini").unwrap();
        assert_eq!(completion.content, "Hola");
        assert_eq!(completion.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(completion.usage, Some(TokenUsage::new(10, 5)));
        assert_eq!(completion.request_id.as_deref(), Some("chatcmpl-abc"));
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_missing_total_saturates() {
        let body = json!({
            "choices": [{"message": {"content": "x"}}],
            "usage": {"prompt_tokens": 4_000_000_000u64, "completion_tokens": 4_000_000_000u64}
        });

        let completion = OpenAiProvider::convert_completion(body, "gpt-4o").unwrap();
        assert_eq!(completion.usage.unwrap().total_tokens, u32::MAX);
    }

    #[test]
    fn test_empty_choices_is_provider_error() {
        let err = OpenAiProvider::convert_completion(json!({"choices": []}), "m").unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;
        assert!(matches!(OpenAiProvider::status_error(StatusCode::UNAUTHORIZED, ""), AgentError::Auth(_)));
        assert!(matches!(
            OpenAiProvider::status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::ProviderUnavailable(_)
        ));
        assert!(matches!(OpenAiProvider::status_error(StatusCode::BAD_REQUEST, ""), AgentError::Provider(_)));
    }
}
