//! MediaWiki API Client

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{WikiClient, is_valid_lang};
use crate::error::{KindsError, Result};

const USER_AGENT: &str = concat!("agent-kinds/", env!("CARGO_PKG_VERSION"));

/// Client for `https://<lang>.wikipedia.org/w/api.php`
pub struct HttpWikiClient {
    client: reqwest::Client,
    lang: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extract: Option<String>,
}

impl HttpWikiClient {
    pub fn new(lang: impl Into<String>) -> Result<Self> {
        let lang = lang.into();
        if !is_valid_lang(&lang) {
            return Err(KindsError::UnsupportedLanguage(lang));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("https://{lang}.wikipedia.org/w/api.php"),
            lang,
        })
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl WikiClient for HttpWikiClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        tracing::debug!(lang = %self.lang, query, "wikipedia search");

        let response: SearchResponse = self
            .get(&[("action", "query"), ("list", "search"), ("srsearch", query), ("srlimit", limit.as_str())])
            .await?;

        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    async fn summary(&self, title: &str) -> Result<Option<String>> {
        let response: ExtractResponse = self
            .get(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        let page = response.query.and_then(|q| q.pages.into_iter().next());
        Ok(page
            .filter(|p| !p.missing)
            .and_then(|p| p.extract)
            .filter(|text| !text.trim().is_empty()))
    }

    fn lang(&self) -> &str {
        &self.lang
    }
}
