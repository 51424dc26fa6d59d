//! Default Agent Context

use std::sync::Arc;

use agent_core::{AgentContext, Utility};

use crate::error::Result;
use crate::tools::WikipediaTool;
use crate::utils::KeywordRag;

/// Context with an empty keyword RAG and a live Wikipedia tool for `lang`
pub fn default_context(lang: &str) -> Result<AgentContext> {
    context_with(lang, KeywordRag::new())
}

/// Same as [`default_context`] with a caller-provided document set
pub fn context_with(lang: &str, rag: KeywordRag) -> Result<AgentContext> {
    tracing::debug!(lang, documents = rag.len(), "building agent context");
    Ok(AgentContext::new()
        .with_utility(Utility::expander(rag))
        .with_tool(Arc::new(WikipediaTool::for_lang(lang)?)))
}
