//! Wikipedia Access
//!
//! Search and summary lookups behind a strategy trait so the tool can run
//! against the live MediaWiki API or a fixed page set.

mod http;
mod mock;

pub use http::HttpWikiClient;
pub use mock::StaticWikiClient;

use async_trait::async_trait;

use crate::error::Result;

/// Wikipedia client trait (Strategy pattern)
#[async_trait]
pub trait WikiClient: Send + Sync {
    /// Titles of the best matching pages, best first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Plain-text introduction of a page, `None` if the page does not exist
    async fn summary(&self, title: &str) -> Result<Option<String>>;

    /// Language edition queried, e.g. `"es"`
    fn lang(&self) -> &str;
}

/// Accept short language codes such as `es`, `en`, `pt-br` or `simple`
pub fn is_valid_lang(lang: &str) -> bool {
    (2..=12).contains(&lang.len())
        && lang.starts_with(|c: char| c.is_ascii_lowercase())
        && lang.chars().all(|c| c.is_ascii_lowercase() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert!(is_valid_lang("es"));
        assert!(is_valid_lang("pt-br"));
        assert!(is_valid_lang("simple"));
        assert!(!is_valid_lang("e"));
        assert!(!is_valid_lang("ES"));
        assert!(!is_valid_lang("es.evil.com/"));
    }
}
