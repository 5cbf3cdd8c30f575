//! Weighted merge of several vector stores behind one [`VectorStore`].
//!
//! Writes fan out to every member. A query asks each member for `2 * top_k`
//! candidates, min-max normalises each member's scores to `[0, 1]`, weights
//! them, and sums contributions per chunk ID. The merged list is ordered by
//! descending score; ties go to the chunk whose first contributing member
//! was registered earliest, then to the chunk seen first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{Chunk, Embedding, RetrievalResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Source tag for results that more than one member contributed to.
pub const HYBRID_SOURCE: &str = "hybrid";

struct Member {
    name: String,
    store: Arc<dyn VectorStore>,
    weight: f32,
}

/// A [`VectorStore`] that merges the rankings of several named members.
///
/// # Example
///
/// ```rust,ignore
/// use ragport::HybridVectorStore;
///
/// let store = HybridVectorStore::builder()
///     .store("dense", Arc::new(dense), 0.7)
///     .store("keyword", Arc::new(keyword), 0.3)
///     .build()?;
/// ```
pub struct HybridVectorStore {
    members: Vec<Member>,
}

impl HybridVectorStore {
    pub fn builder() -> HybridVectorStoreBuilder {
        HybridVectorStoreBuilder::default()
    }
}

/// Builder for [`HybridVectorStore`]. Registration order is tie-break priority.
#[derive(Default)]
pub struct HybridVectorStoreBuilder {
    members: Vec<Member>,
}

impl HybridVectorStoreBuilder {
    /// Register a member store with a relative weight.
    pub fn store(
        mut self,
        name: impl Into<String>,
        store: Arc<dyn VectorStore>,
        weight: f32,
    ) -> Self {
        self.members.push(Member { name: name.into(), store, weight });
        self
    }

    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if no member is registered or a
    /// weight is not a positive finite number. Weights are normalised to sum to 1.
    pub fn build(mut self) -> Result<HybridVectorStore> {
        if self.members.is_empty() {
            return Err(RagError::Configuration(
                "hybrid store needs at least one member".to_string(),
            ));
        }
        if let Some(bad) = self.members.iter().find(|m| !(m.weight.is_finite() && m.weight > 0.0)) {
            return Err(RagError::Configuration(format!(
                "hybrid member '{}' has invalid weight {}",
                bad.name, bad.weight
            )));
        }
        let total: f32 = self.members.iter().map(|m| m.weight).sum();
        for member in &mut self.members {
            member.weight /= total;
        }
        Ok(HybridVectorStore { members: self.members })
    }
}

/// Scale scores to `[0, 1]`; a flat list maps to 1.0.
fn normalize(results: &[RetrievalResult]) -> Vec<f32> {
    let min = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
    let max = results.iter().map(|r| r.score).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    results
        .iter()
        .map(|r| if range > f32::EPSILON { (r.score - min) / range } else { 1.0 })
        .collect()
}

struct Candidate {
    result: RetrievalResult,
    score: f32,
    priority: usize,
    contributors: usize,
}

#[async_trait]
impl VectorStore for HybridVectorStore {
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        for member in &self.members {
            member.store.ensure_collection(collection, dimensions).await?;
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[(Chunk, Embedding)]) -> Result<()> {
        for member in &self.members {
            member.store.upsert(collection, records).await?;
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let fetch = top_k.saturating_mul(2);
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for (priority, member) in self.members.iter().enumerate() {
            let results = member.store.query(collection, embedding, fetch).await?;
            debug!(member = %member.name, result_count = results.len(), "hybrid member answered");
            let normalized = normalize(&results);

            for (mut result, norm) in results.into_iter().zip(normalized) {
                let contribution = norm * member.weight;
                match by_id.get(&result.chunk.id) {
                    Some(&i) => {
                        candidates[i].score += contribution;
                        candidates[i].contributors += 1;
                    }
                    None => {
                        by_id.insert(result.chunk.id.clone(), candidates.len());
                        result.source = member.name.clone();
                        candidates.push(Candidate {
                            result,
                            score: contribution,
                            priority,
                            contributors: 1,
                        });
                    }
                }
            }
        }

        // Stable sort: equal score and priority keep first-seen order.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.priority.cmp(&b.priority))
        });

        Ok(candidates
            .into_iter()
            .take(top_k)
            .map(|c| {
                let mut result = c.result;
                result.score = c.score;
                if c.contributors > 1 {
                    result.source = HYBRID_SOURCE.to_string();
                }
                result
            })
            .collect())
    }

    fn name(&self) -> &str {
        HYBRID_SOURCE
    }
}
