//! Tooled Agent
//!
//! Chat agent that can consult tools through the reasoning loop.
//!
//! ```text
//! instruction ──▶ rag.expand (optional) ──▶ memory history (optional)
//!                                                 │
//!            ReasoningLoop(model, temperature, max_tokens, tools)
//!                                                 │
//!                       answer ──▶ memory.append (optional)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agent_core::{
    Agent, Capability, FieldSpec, GenerationOptions, LlmProvider, Message, ReasoningLoop, Result, Schema,
    SharedMemory, Tool, Validated, reasoning::DEFAULT_SYSTEM_PROMPT,
};

/// Typed view of a validated `TooledConfig`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TooledConfig {
    pub model: String,

    pub temperature: f64,

    pub max_tokens: u32,

    /// Language edition used for lookups, e.g. `"es"`
    pub lang: String,

    pub system_prompt: String,
}

impl Default for TooledConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            max_tokens: 256,
            lang: "es".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }
}

impl TooledConfig {
    #[allow(clippy::cast_possible_truncation)]
    pub fn generation(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            temperature: self.temperature as f32,
            max_tokens: self.max_tokens,
            stop_sequences: Vec::new(),
        }
    }
}

pub struct TooledAgent {
    provider: Arc<dyn LlmProvider>,
}

impl TooledAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    fn with_context(instruction: &str, context: &str) -> String {
        format!("Context:\n{context}\n\nQuestion: {instruction}")
    }
}

#[async_trait]
impl Agent for TooledAgent {
    fn config_schema() -> Option<Schema> {
        let defaults = TooledConfig::default();
        Some(
            Schema::new("TooledConfig")
                .field(FieldSpec::string("model").title("Model").default(defaults.model))
                .field(
                    FieldSpec::number("temperature")
                        .title("Temperature")
                        .ge(0.0)
                        .le(2.0)
                        .default(defaults.temperature),
                )
                .field(
                    FieldSpec::integer("max_tokens")
                        .title("Max tokens")
                        .ge(1.0)
                        .le(8192.0)
                        .default(defaults.max_tokens),
                )
                .field(
                    FieldSpec::string("lang")
                        .title("Language")
                        .pattern("^[a-z][a-z-]{1,11}$")
                        .default(defaults.lang),
                )
                .field(
                    FieldSpec::string("system_prompt")
                        .title("System prompt")
                        .default(defaults.system_prompt),
                ),
        )
    }

    fn dependency_schema() -> Option<Schema> {
        Some(
            Schema::new("TooledDeps")
                .field(
                    FieldSpec::instance::<SharedMemory>("memory")
                        .describe("Conversation memory shared across runs")
                        .optional(),
                )
                .field(
                    FieldSpec::capability("rag", Capability::RagExpander)
                        .describe("Retrieval provider")
                        .optional(),
                )
                .field(
                    FieldSpec::capability("wikipedia", Capability::Tool)
                        .describe("Encyclopedia lookup tool")
                        .optional(),
                ),
        )
    }

    async fn execute(
        &self,
        instruction: &str,
        cfg: Option<&Validated>,
        deps: Option<&Validated>,
        tools: &[Arc<dyn Tool>],
    ) -> Result<String> {
        let config: TooledConfig = match cfg {
            Some(cfg) => cfg.parse()?,
            None => TooledConfig::default(),
        };
        let memory = deps.and_then(|d| d.instance::<SharedMemory>("memory"));
        let rag = deps.and_then(|d| d.expander("rag"));

        let question = match rag.map(|r| r.expand(instruction)) {
            Some(context) if !context.trim().is_empty() => Self::with_context(instruction, &context),
            _ => instruction.to_string(),
        };
        let history = memory.as_ref().map(|m| m.history()).unwrap_or_default();

        tracing::debug!(
            model = %config.model,
            lang = %config.lang,
            tools = tools.len(),
            history = history.len(),
            "tooled agent run"
        );

        let reasoning = ReasoningLoop::builder()
            .provider(self.provider.clone())
            .tools(tools)
            .system_prompt(config.system_prompt.clone())
            .generation(config.generation())
            .build()?;

        let answer = reasoning.ask_with_history(&history, &question).await?;

        if let Some(memory) = memory {
            memory.append(Message::user(instruction));
            memory.append(Message::assistant(answer.clone()));
        }

        Ok(answer)
    }
}
