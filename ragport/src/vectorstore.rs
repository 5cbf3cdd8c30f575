//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, Embedding, RetrievalResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of chunks and must tolerate
/// concurrent calls from several ingestion tasks; connection and thread
/// safety are the adapter's concern.
///
/// # Example
///
/// ```rust,ignore
/// use ragport::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_collection("docs", 384).await?;
/// store.upsert("docs", &records).await?;
/// let results = store.query("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection if absent. Idempotent.
    ///
    /// An existing collection with a different dimensionality is a
    /// [`RagError::Configuration`](crate::RagError::Configuration) error.
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()>;

    /// Insert or overwrite chunks keyed by [`Chunk::id`].
    async fn upsert(&self, collection: &str, records: &[(Chunk, Embedding)]) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score; equal scores
    /// keep the store's native order.
    async fn query(
        &self,
        collection: &str,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>>;

    /// Name used in errors and logs.
    fn name(&self) -> &str {
        "vector_store"
    }
}
