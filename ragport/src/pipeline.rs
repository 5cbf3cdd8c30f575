//! RAG pipeline facade.
//!
//! The [`RagPipeline`] composes the six ports and exposes two operations:
//! [`ingest`](RagPipeline::ingest) (load → chunk → embed → store) and
//! [`query_stream`](RagPipeline::query_stream) (embed → retrieve → rerank →
//! assemble → generate).
//!
//! # Example
//!
//! ```rust,ignore
//! use ragport::{
//!     DocumentSource, InMemoryVectorStore, QueryOptions, RagPipeline, SentenceChunker, TextLoader,
//! };
//!
//! let pipeline = RagPipeline::builder()
//!     .document_loader(Arc::new(TextLoader::new()))
//!     .chunker(Arc::new(SentenceChunker))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .llm(Arc::new(my_llm))
//!     .collection("docs")
//!     .build()?;
//!
//! let report = pipeline.ingest(vec![DocumentSource::path("notes/")], None).await?;
//! let answer = pipeline.query_stream("What is in my notes?", QueryOptions::new()).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::chunking::Chunker;
use crate::config::{ContextBudget, RagConfig};
use crate::document::DocumentSource;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::ingest::IngestionOrchestrator;
use crate::llm::Llm;
use crate::loader::DocumentLoader;
use crate::query::{AnswerStream, QueryOptions, QueryOrchestrator};
use crate::report::IngestionReport;
use crate::reranker::Reranker;
use crate::vectorstore::VectorStore;

/// A configured retrieval-augmented generation pipeline.
///
/// Immutable once built and safe to share across tasks; concurrent
/// `ingest` and `query_stream` calls do not interfere beyond what the
/// vector store itself serialises. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: Arc<RagConfig>,
    ingestion: IngestionOrchestrator,
    query: QueryOrchestrator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ingest `sources` into `collection` (or the configured collection).
    ///
    /// Per-source and per-document failures never abort the call: they are
    /// recorded in the returned [`IngestionReport`], one entry per source in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] only if `collection` is given but empty.
    pub async fn ingest(
        &self,
        sources: impl IntoIterator<Item = DocumentSource>,
        collection: Option<&str>,
    ) -> Result<IngestionReport> {
        let collection = match collection {
            Some(name) if name.trim().is_empty() => {
                return Err(RagError::Configuration(
                    "collection name must not be empty".to_string(),
                ));
            }
            Some(name) => name,
            None => self.config.collection.as_str(),
        };
        let sources: Vec<DocumentSource> = sources.into_iter().collect();
        info!(collection, source_count = sources.len(), "starting ingestion");
        Ok(self.ingestion.run(sources, collection).await)
    }

    /// Answer `question` from the indexed content as a stream of tokens.
    ///
    /// Retrieval, reranking and context assembly finish before this returns;
    /// generation proceeds as the stream is polled. An empty retrieval still
    /// produces an answer, generated without retrieved material.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error if embedding, retrieval, reranking
    /// or the start of generation fails. Errors after the first token arrive
    /// as the stream's final item.
    pub async fn query_stream(
        &self,
        question: &str,
        options: QueryOptions,
    ) -> Result<AnswerStream> {
        self.query.run(question, &options).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The LLM, embedding provider, vector store, document loader and chunker
/// are required; the reranker is optional. Settings default to
/// [`RagConfig::default()`]. `build` takes `&self`, so one builder can
/// produce several pipelines.
#[derive(Clone, Default)]
pub struct RagPipelineBuilder {
    config: RagConfig,
    llm: Option<Arc<dyn Llm>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    document_loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Replace every setting at once.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn document_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.document_loader = Some(loader);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set an optional reranker applied between retrieval and context assembly.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.config.concurrency = limit;
        self
    }

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

    /// Build the [`RagPipeline`], validating that all required ports are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] naming the first missing port, or
    /// the first setting that fails [`RagConfig::validate`].
    pub fn build(&self) -> Result<RagPipeline> {
        let llm = required(&self.llm, "llm")?;
        let embedder = required(&self.embedding_provider, "embedding_provider")?;
        let store = required(&self.vector_store, "vector_store")?;
        let loader = required(&self.document_loader, "document_loader")?;
        let chunker = required(&self.chunker, "chunker")?;
        self.config.validate()?;

        let config = Arc::new(self.config.clone());
        Ok(RagPipeline {
            ingestion: IngestionOrchestrator {
                config: Arc::clone(&config),
                loader,
                chunker,
                embedder: Arc::clone(&embedder),
                store: Arc::clone(&store),
            },
            query: QueryOrchestrator {
                config: Arc::clone(&config),
                embedder,
                store,
                reranker: self.reranker.clone(),
                llm,
            },
            config,
        })
    }
}

fn required<T: ?Sized>(port: &Option<Arc<T>>, name: &str) -> Result<Arc<T>> {
    port.clone().ok_or_else(|| RagError::Configuration(format!("{name} is required")))
}
