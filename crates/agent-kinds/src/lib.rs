//! # agent-kinds
//!
//! Ready-made agents, tools and utilities on top of `agent-core`.
//!
//! - [`EchoAgent`]: no configuration, no dependencies
//! - [`TooledAgent`]: chat agent with optional RAG, memory and tools
//! - [`WikipediaTool`]: encyclopedia lookup in a chosen language
//! - [`KeywordRag`]: keyword-overlap retrieval expander
//!
//! [`default_context`] bundles the utilities and tools a runner hands to
//! its agents.

pub mod context;
pub mod error;
pub mod kinds;
pub mod tools;
pub mod utils;
pub mod wiki;

pub use context::{context_with, default_context};
pub use error::{KindsError, Result};
pub use kinds::{EchoAgent, TooledAgent, TooledConfig};
pub use tools::WikipediaTool;
pub use utils::KeywordRag;
pub use wiki::{HttpWikiClient, StaticWikiClient, WikiClient};
