//! Reasoning Loop
//!
//! Text-protocol tool calling: the model answers either with plain text
//! (final answer) or with a fenced ```tool block naming a tool and its
//! arguments. Tool output is fed back as a tool message and the loop
//! continues until a plain answer or the iteration cap.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Loop configuration
#[derive(Clone, Debug)]
pub struct ReasoningConfig {
    /// System prompt; tool descriptions are appended when tools exist
    pub system_prompt: String,

    /// Maximum model calls before giving up
    pub max_iterations: usize,

    /// Generation options passed to every call
    pub generation: GenerationOptions,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 6,
            generation: GenerationOptions::default(),
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful agent. Use tools when necessary.";

const TOOL_PROTOCOL: &str = r#"When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so."#;

/// Tool-calling loop over one provider
pub struct ReasoningLoop {
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    config: ReasoningConfig,
}

impl ReasoningLoop {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: ToolRegistry, config: ReasoningConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn builder() -> ReasoningLoopBuilder {
        ReasoningLoopBuilder::default()
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(TOOL_PROTOCOL);
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Continue a conversation until the model gives a final answer
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String> {
        if conversation.messages().first().map(|m| &m.role) != Some(&Role::System) {
            let mut seeded = Conversation::with_system_prompt(self.build_system_prompt());
            seeded.extend(conversation.messages().iter().cloned());
            *conversation = seeded;
        }

        for iteration in 1..=self.config.max_iterations {
            let completion = self
                .provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;
            let content = completion.content;
            conversation.push(Message::assistant(content.clone()));

            let Some(call) = parse_tool_call(&content) else {
                tracing::debug!(iteration, "final answer");
                return Ok(content);
            };

            tracing::debug!(iteration, tool = %call.name, "tool requested");
            let result = self.execute_tool(&call).await;
            conversation.push(Message::tool(format_tool_result(&result), call.id.clone()));
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    /// Answer a single question
    pub async fn ask(&self, question: &str) -> Result<String> {
        self.ask_with_history(&[], question).await
    }

    /// Answer a question after prior turns (e.g. from shared memory)
    pub async fn ask_with_history(&self, history: &[Message], question: &str) -> Result<String> {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt());
        conversation.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        conversation.push(Message::user(question));
        self.run(&mut conversation).await
    }

    /// Tool failures are reported to the model, not to the caller
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                let failure = ToolResult::failure(call.name.clone(), format!("Error: {e}"));
                match &call.id {
                    Some(id) => failure.with_id(id.clone()),
                    None => failure,
                }
            }
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }
}

/// Parse a tool call from model output
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    const TOOL_START: &str = "```tool";
    const FENCE: &str = "```";

    if let Some(start_idx) = content.find(TOOL_START) {
        let after_marker = &content[start_idx + TOOL_START.len()..];
        if let Some(end_idx) = after_marker.find(FENCE) {
            let json_str = after_marker[..end_idx].trim();
            if let Ok(mut call) = serde_json::from_str::<ToolCall>(json_str) {
                if call.id.is_none() {
                    call.id = Some(uuid::Uuid::new_v4().to_string());
                }
                return Some(call);
            }
        }
    }

    parse_inline_tool_call(content)
}

/// Fallback: a bare JSON object with a "tool" key
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Builder for [`ReasoningLoop`]
#[derive(Default)]
pub struct ReasoningLoopBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: ReasoningConfig,
}

impl ReasoningLoopBuilder {
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: &[Arc<dyn Tool>]) -> Self {
        self.tools = ToolRegistry::from_tools(tools.iter().cloned());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn generation(mut self, generation: GenerationOptions) -> Self {
        self.config.generation = generation;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<ReasoningLoop> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(ReasoningLoop::new(provider, self.tools, self.config))
    }
}
