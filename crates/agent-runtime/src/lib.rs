//! # agent-runtime
//!
//! Runtime providers for agent-core.
//!
//! ## Providers
//!
//! - **OpenAI** (default): any OpenAI-compatible chat-completions endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OpenAiProvider;
//!
//! let provider = TracedProvider::new(Arc::new(OpenAiProvider::from_env()?))
//!     .observe(tracer.clone());
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, GenerationOptions, LlmProvider, Message, Result, Role, TracedProvider};
