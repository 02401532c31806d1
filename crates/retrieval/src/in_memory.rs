//! In-memory keyword retriever for tests and small static corpora.

use async_trait::async_trait;
use reasonchain_core::error::RetrievalError;
use reasonchain_core::retriever::Retriever;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Words too common to say anything about relevance.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "the", "to", "what", "when", "where", "which", "who", "why",
    "with",
];

/// Scores documents by how many distinct query terms they contain.
///
/// Results are ordered by score (descending), ties broken by insertion
/// order, and documents matching no term are never returned.
pub struct InMemoryRetriever {
    documents: Arc<RwLock<Vec<String>>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed the corpus up front.
    pub fn with_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            documents: Arc::new(RwLock::new(documents.into_iter().map(Into::into).collect())),
        }
    }

    /// Add one document to the corpus.
    pub async fn add(&self, document: impl Into<String>) {
        self.documents.write().await.push(document.into());
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let query_terms = terms(query);
        if k == 0 || query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;

        let mut scored: Vec<(usize, usize)> = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let doc_terms = terms(doc);
                (i, query_terms.intersection(&doc_terms).count())
            })
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(k);

        debug!(query, hits = scored.len(), "In-memory retrieval");

        Ok(scored.into_iter().map(|(i, _)| documents[i].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> InMemoryRetriever {
        InMemoryRetriever::with_documents([
            "Rising sea levels erode beaches in small island nations.",
            "Tourism is the largest economic sector for many island nations.",
            "Rust is a systems programming language.",
            "Fishing yields fall as ocean temperatures rise near island reefs.",
        ])
    }

    #[tokio::test]
    async fn ranks_by_matched_terms() {
        let retriever = corpus();
        let results = retriever
            .retrieve("How does tourism affect island economies?", 5)
            .await
            .unwrap();
        assert_eq!(
            results[0],
            "Tourism is the largest economic sector for many island nations."
        );
        assert!(results.iter().all(|r| !r.contains("Rust")));
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let retriever = corpus();
        let results = retriever.retrieve("island", 5).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].starts_with("Rising"));
        assert!(results[1].starts_with("Tourism"));
        assert!(results[2].starts_with("Fishing"));
    }

    #[tokio::test]
    async fn respects_k() {
        let retriever = corpus();
        assert_eq!(retriever.retrieve("island", 2).await.unwrap().len(), 2);
        assert!(retriever.retrieve("island", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let retriever = corpus();
        assert!(retriever.retrieve("quantum chromodynamics", 5).await.unwrap().is_empty());
        assert!(retriever.retrieve("what is the", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_grows_corpus() {
        let retriever = InMemoryRetriever::new();
        assert!(retriever.is_empty().await);
        retriever.add("Coral bleaching harms reef fisheries.").await;
        assert_eq!(retriever.len().await, 1);
        let results = retriever.retrieve("coral reef", 5).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
