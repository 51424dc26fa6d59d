//! Keyword RAG Expander
//!
//! In-memory document set ranked by how many query keywords each document
//! shares. No embeddings, no external store.

use std::collections::HashSet;

use agent_core::RagExpander;

/// Keywords shorter than this are ignored
const MIN_KEYWORD_LEN: usize = 3;

/// Retrieval expander over a fixed list of documents
#[derive(Clone, Debug)]
pub struct KeywordRag {
    documents: Vec<String>,
    top_k: usize,
}

impl Default for KeywordRag {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordRag {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            top_k: 3,
        }
    }

    pub fn with_documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents.extend(documents.into_iter().map(Into::into));
        self
    }

    /// One document per blank-line separated paragraph
    pub fn from_paragraphs(text: &str) -> Self {
        Self::new().with_documents(
            text.split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        )
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn add(&mut self, document: impl Into<String>) {
        self.documents.push(document.into());
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents sharing at least one keyword with `query`, best first.
    ///
    /// Ties keep insertion order.
    pub fn rank(&self, query: &str) -> Vec<(usize, &str)> {
        let wanted = keywords(query);
        if wanted.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &str)> = self
            .documents
            .iter()
            .map(|doc| (keywords(doc).intersection(&wanted).count(), doc.as_str()))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.top_k);
        scored
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

impl RagExpander for KeywordRag {
    fn expand(&self, query: &str) -> String {
        let hits = self.rank(query);
        tracing::debug!(hits = hits.len(), "keyword rag expansion");
        hits.into_iter()
            .map(|(_, doc)| doc)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> KeywordRag {
        KeywordRag::new().with_documents([
            "Madrid es la capital de España.",
            "Lisboa es la capital de Portugal.",
            "España limita con Portugal y Francia.",
            "El Amazonas es el río más caudaloso.",
        ])
    }

    #[test]
    fn test_ranks_by_overlap() {
        let rag = corpus();
        let ranked = rag.rank("¿Cuál es la capital de España?");
        assert_eq!(ranked[0].1, "Madrid es la capital de España.");
        assert_eq!(ranked[0].0, 2);
        assert!(ranked.iter().all(|(_, doc)| !doc.contains("Amazonas")));
    }

    #[test]
    fn test_expand_joins_top_k() {
        let rag = corpus().with_top_k(2);
        let expanded = rag.expand("capital España Portugal");
        assert_eq!(expanded.lines().count(), 2);
    }

    #[test]
    fn test_from_paragraphs() {
        let rag = KeywordRag::from_paragraphs("Primer párrafo.\n\n\n\nSegundo párrafo.\n");
        assert_eq!(rag.len(), 2);
        assert_eq!(rag.expand("segundo"), "Segundo párrafo.");
    }

    #[test]
    fn test_no_overlap_expands_to_empty() {
        assert_eq!(corpus().expand("quantum chromodynamics"), "");
        assert_eq!(KeywordRag::new().expand("capital"), "");
        assert_eq!(corpus().expand("de la"), "");
    }
}
