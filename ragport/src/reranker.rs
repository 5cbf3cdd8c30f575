//! Reranker trait for re-scoring retrieval results.

use async_trait::async_trait;

use crate::document::RetrievalResult;
use crate::error::Result;

/// A reranker that re-scores and reorders retrieval results.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond initial vector similarity.
/// Reranking is optional: a pipeline without one keeps the store's order.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank retrieval results given the original question.
    ///
    /// Returns results in a new order with potentially updated scores.
    async fn rerank(
        &self,
        question: &str,
        results: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>>;

    /// Name used in errors and logs.
    fn name(&self) -> &str {
        "reranker"
    }
}
