//! Configuration for the RAG pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Placeholder replaced by the rendered context in [`RagConfig::system_prompt`].
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
based on the provided context.\nIf the context doesn't contain relevant information, say so \
honestly.\n\nContext:\n{context}\n";

/// Upper bounds on the retrieved material handed to the model.
///
/// When the retrieved set exceeds either bound, the lowest-ranked entries
/// are dropped first; kept entries are never reordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    /// Maximum number of chunks in the context.
    pub max_chunks: Option<usize>,
    /// Maximum combined characters of chunk content.
    pub max_chars: Option<usize>,
}

impl ContextBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = Some(max_chunks);
        self
    }

    pub fn max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }
}

/// Configuration parameters for the RAG pipeline.
///
/// A built [`RagPipeline`](crate::RagPipeline) owns an immutable copy;
/// reconfiguring means building a new pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Collection (namespace) written by ingestion and searched by queries.
    pub collection: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Maximum number of sources ingested concurrently.
    pub concurrency: usize,
    /// Deadline applied to each load, embed, store, rerank and generate call.
    pub step_timeout: Option<Duration>,
    /// Extra attempts for batch embedding after a transient failure.
    pub embed_retries: usize,
    /// Whether a configured reranker is applied to retrieved results.
    pub rerank_enabled: bool,
    /// Results scoring below this are dropped before context assembly.
    pub similarity_threshold: Option<f32>,
    pub context_budget: ContextBudget,
    /// System prompt template; must contain `{context}`.
    pub system_prompt: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: "ragport_default".to_string(),
            chunk_size: 512,
            chunk_overlap: 100,
            top_k: 5,
            concurrency: 4,
            step_timeout: None,
            embed_retries: 1,
            rerank_enabled: true,
            similarity_threshold: None,
            context_budget: ContextBudget::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check the invariants every pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `collection` is empty
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `concurrency == 0`
    /// - `system_prompt` lacks the `{context}` placeholder
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(RagError::Configuration("collection name must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        if self.concurrency == 0 {
            return Err(RagError::Configuration(
                "concurrency must be greater than zero".to_string(),
            ));
        }
        if !self.system_prompt.contains(CONTEXT_PLACEHOLDER) {
            return Err(RagError::Configuration(format!(
                "system_prompt must contain the {CONTEXT_PLACEHOLDER} placeholder"
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set how many sources are ingested concurrently.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.config.concurrency = limit;
        self
    }

    /// Set the per-call deadline for port operations.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout = Some(timeout);
        self
    }

    pub fn embed_retries(mut self, retries: usize) -> Self {
        self.config.embed_retries = retries;
        self
    }

    pub fn rerank_enabled(mut self, enabled: bool) -> Self {
        self.config.rerank_enabled = enabled;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    pub fn context_budget(mut self, budget: ContextBudget) -> Self {
        self.config.context_budget = budget;
        self
    }

    pub fn system_prompt(mut self, template: impl Into<String>) -> Self {
        self.config.system_prompt = template.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
