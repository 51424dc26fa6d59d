//! # agent-core
//!
//! Agent contract with schema-validated configuration and dependencies,
//! dependency matching against a utility context, and per-invocation cost
//! tracing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          PreparedAgent                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  Validation  │  │  AgentContext│  │  Agent::execute        │  │
//! │  │  (Schema)    │──│  (inject)    │──│  ReasoningLoop + Tools │  │
//! │  └──────────────┘  └──────────────┘  └───────────┬────────────┘  │
//! └──────────────────────────────────────────────────┼───────────────┘
//!                                                    │
//!                    TracedProvider ──events──▶ CostTracer
//! ```
//!
//! Validation failures come back as structured reports
//! (`<section>.missing`, `<section>.validation`, `<section>.not_supported`),
//! never as free text.

pub mod agent;
pub mod context;
pub mod cost;
pub mod error;
pub mod inspect;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod schema;
pub mod tool;
pub mod validation;

pub use agent::{Agent, PreparedAgent, resolve};
pub use context::{AgentContext, Capability, RagExpander, Utility};
pub use cost::{CostTotals, CostTracer, InvocationRecord};
pub use error::{AgentError, Result};
pub use inspect::inspect;
pub use message::{Conversation, Message, Role, SharedMemory};
pub use provider::{GenerationOptions, InvocationObserver, LlmProvider, LlmResponse, RunId, TracedProvider};
pub use reasoning::ReasoningLoop;
pub use schema::{FieldSpec, FieldType, Schema};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema, merge_tools};
pub use validation::{Payload, Section, Validated, ValidationFailure, ValidationReport};
