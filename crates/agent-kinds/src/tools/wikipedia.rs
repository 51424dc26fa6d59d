//! Wikipedia Tool
//!
//! Searches one language edition and returns the introductions of the top
//! pages as plain text.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, tool::ParameterSchema};

use crate::error::Result;
use crate::wiki::{HttpWikiClient, WikiClient};

/// Output cap in characters
pub const MAX_SUMMARY_CHARS: usize = 4000;

/// Returned when the search yields no usable page
pub const NO_RESULT: &str = "No good Wikipedia Search Result was found";

const TOP_K: usize = 3;

/// Tool for looking up topics on Wikipedia
pub struct WikipediaTool {
    client: Arc<dyn WikiClient>,
    top_k: usize,
}

impl WikipediaTool {
    pub fn new(client: Arc<dyn WikiClient>) -> Self {
        Self { client, top_k: TOP_K }
    }

    /// Live client for the given language edition
    pub fn for_lang(lang: &str) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpWikiClient::new(lang)?)))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Search, then fetch each hit's summary
    pub async fn lookup(&self, query: &str) -> Result<String> {
        let titles = self.client.search(query, self.top_k).await?;

        let mut sections = Vec::new();
        for title in titles {
            match self.client.summary(&title).await? {
                Some(summary) => sections.push(format!("Page: {title}\nSummary: {summary}")),
                None => tracing::debug!(%title, "page without summary"),
            }
        }

        if sections.is_empty() {
            return Ok(NO_RESULT.to_string());
        }

        Ok(truncate_chars(&sections.join("\n\n"), MAX_SUMMARY_CHARS))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("wikipedia", "Query Wikipedia and return a summary")
            .param(ParameterSchema::string("query", "Topic or question to look up").required())
            .category("knowledge")
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        self.validate(call)?;
        let query = call.str_arg("query").unwrap_or_default().trim();

        if query.is_empty() {
            return Ok(ToolResult::failure("wikipedia", "query must not be empty"));
        }

        tracing::debug!(lang = self.client.lang(), query, "wikipedia lookup");
        match self.lookup(query).await {
            Ok(output) => Ok(ToolResult::success("wikipedia", output)),
            Err(e) => {
                tracing::warn!(error = %e, "wikipedia lookup failed");
                Ok(ToolResult::failure("wikipedia", e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::StaticWikiClient;

    fn tool(client: StaticWikiClient) -> WikipediaTool {
        WikipediaTool::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_returns_page_summaries() {
        let wiki = tool(
            StaticWikiClient::new("es")
                .page("Madrid", "Madrid es la capital de España.")
                .page("Lisboa", "Lisboa es la capital de Portugal."),
        );

        let call = ToolCall::new("wikipedia").arg("query", "Madrid");
        let result = wiki.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Page: Madrid\nSummary: Madrid es la capital de España.");
    }

    #[tokio::test]
    async fn test_no_match() {
        let wiki = tool(StaticWikiClient::new("es").page("Madrid", "capital"));
        let result = wiki
            .execute(&ToolCall::new("wikipedia").arg("query", "Tokio"))
            .await
            .unwrap();
        assert_eq!(result.output, NO_RESULT);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let long = "a".repeat(3000);
        let wiki = tool(
            StaticWikiClient::new("en")
                .page("One", long.clone())
                .page("Two", long.clone())
                .page("Three", long),
        );

        let output = wiki.lookup("a").await.unwrap();
        assert_eq!(output.chars().count(), MAX_SUMMARY_CHARS);
    }

    #[tokio::test]
    async fn test_top_k_limits_pages() {
        let wiki = tool(
            StaticWikiClient::new("en")
                .page("Rust", "rust language")
                .page("Rust (fungus)", "rust fungus")
                .page("Rust Belt", "rust region"),
        )
        .with_top_k(2);

        let output = wiki.lookup("rust").await.unwrap();
        assert_eq!(output.matches("Page: ").count(), 2);
    }

    #[tokio::test]
    async fn test_lookup_failure_reported_as_tool_failure() {
        let wiki = tool(StaticWikiClient::new("en").offline());
        let result = wiki
            .execute(&ToolCall::new("wikipedia").arg("query", "Rust"))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("unreachable"));
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let wiki = tool(StaticWikiClient::new("en"));
        assert!(wiki.execute(&ToolCall::new("wikipedia")).await.is_err());
        assert_eq!(wiki.name(), "wikipedia");
    }
}
