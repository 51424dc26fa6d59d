//! Static Wikipedia Client
//!
//! Fixed page set for tests and offline runs.

use async_trait::async_trait;

use super::WikiClient;
use crate::error::{KindsError, Result};

/// Client answering from an in-memory list of `(title, summary)` pages
#[derive(Debug, Default)]
pub struct StaticWikiClient {
    lang: String,
    pages: Vec<(String, String)>,
    offline: bool,
}

impl StaticWikiClient {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            ..Self::default()
        }
    }

    pub fn page(mut self, title: impl Into<String>, summary: impl Into<String>) -> Self {
        self.pages.push((title.into(), summary.into()));
        self
    }

    /// Every lookup fails, as if the network were down
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(KindsError::Lookup("wikipedia is unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WikiClient for StaticWikiClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.check_online()?;
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

        Ok(self
            .pages
            .iter()
            .filter(|(title, summary)| {
                let haystack = format!("{title} {summary}").to_lowercase();
                words.iter().any(|w| haystack.contains(w.as_str()))
            })
            .take(limit)
            .map(|(title, _)| title.clone())
            .collect())
    }

    async fn summary(&self, title: &str) -> Result<Option<String>> {
        self.check_online()?;
        Ok(self
            .pages
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, summary)| summary.clone()))
    }

    fn lang(&self) -> &str {
        &self.lang
    }
}
