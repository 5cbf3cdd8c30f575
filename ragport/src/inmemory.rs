//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, Embedding, RetrievalResult};
use crate::error::{ErrorCause, RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "in_memory";

#[derive(Debug)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
    /// Insertion sequence; breaks score ties deterministically.
    seq: u64,
}

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as nested `HashMap`s: collection name → chunk ID → entry.
/// Each collection remembers its dimensionality and rejects vectors of any
/// other length. Overwriting a chunk keeps its original insertion position.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks stored in `collection` (0 if it does not exist).
    pub async fn len(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, |c| c.entries.len())
    }

    /// Dimensionality of `collection`, if it exists.
    pub async fn dimensions(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.dimensions)
    }

    fn missing(collection: &str) -> RagError {
        RagError::store(
            BACKEND,
            ErrorCause::InvalidInput,
            format!("collection '{collection}' does not exist"),
        )
    }

    fn check_len(collection: &Collection, name: &str, len: usize) -> Result<()> {
        if len != collection.dimensions {
            return Err(RagError::store(
                BACKEND,
                ErrorCause::InvalidInput,
                format!(
                    "vector of length {len} does not match collection '{name}' ({} dimensions)",
                    collection.dimensions
                ),
            ));
        }
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(collection) {
            Some(existing) if existing.dimensions != dimensions => {
                Err(RagError::Configuration(format!(
                    "collection '{collection}' has {} dimensions, embeddings have {dimensions}",
                    existing.dimensions
                )))
            }
            Some(_) => Ok(()),
            None => {
                collections.insert(
                    collection.to_string(),
                    Collection { dimensions, entries: HashMap::new(), next_seq: 0 },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: &str, records: &[(Chunk, Embedding)]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;

        // Validate the whole batch first so a bad record never leaves a partial write.
        for (_, embedding) in records {
            Self::check_len(store, collection, embedding.dimensions())?;
        }

        for (chunk, embedding) in records {
            let seq = match store.entries.get(&chunk.id) {
                Some(existing) => existing.seq,
                None => {
                    store.next_seq += 1;
                    store.next_seq
                }
            };
            store.entries.insert(
                chunk.id.clone(),
                Entry { chunk: chunk.clone(), vector: embedding.vector.clone(), seq },
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let collections = self.collections.read().await;
        // Nothing ingested yet: an empty ranking, not an error.
        let Some(store) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Self::check_len(store, collection, embedding.dimensions())?;

        let mut scored: Vec<(f32, u64, &Chunk)> = store
            .entries
            .values()
            .map(|entry| {
                let score = cosine_similarity(&entry.vector, &embedding.vector);
                (score, entry.seq, &entry.chunk)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, _, chunk)| RetrievalResult::new(chunk.clone(), score))
            .collect())
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
