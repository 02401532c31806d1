//! Retriever trait: evidence lookup for a single query.

use async_trait::async_trait;

use crate::error::RetrievalError;

/// Returns an ordered sequence of at most `k` evidence snippets for a query.
///
/// An empty result is a valid answer, not an error.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError>;
}
