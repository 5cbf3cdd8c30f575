//! Retrieval-augmented generation orchestration.
//!
//! This crate provides:
//! - Domain models for documents, chunks, embeddings and retrieval results
//! - Port traits for loaders, chunkers, embedding providers, vector stores,
//!   rerankers and streaming language models
//! - A [`RagPipeline`] that ingests sources into a vector store and answers
//!   questions as a token stream
//! - Reference adapters: [`TextLoader`], [`FixedSizeChunker`],
//!   [`SentenceChunker`], [`InMemoryVectorStore`] and [`HybridVectorStore`]
//!
//! The crate logs through `tracing` and never installs a subscriber.

mod chunking;
mod config;
mod context;
mod deadline;
mod document;
mod embedding;
mod error;
mod hybrid;
mod ingest;
mod inmemory;
mod llm;
mod loader;
mod pipeline;
mod query;
mod report;
mod reranker;
mod vectorstore;

pub use chunking::{ChunkParams, Chunker, FixedSizeChunker, SentenceChunker};
pub use config::{
    CONTEXT_PLACEHOLDER, ContextBudget, DEFAULT_SYSTEM_PROMPT, RagConfig, RagConfigBuilder,
};
pub use context::{NO_CONTEXT_MARKER, PromptContext};
pub use document::{
    Chunk, Document, DocumentSource, Element, Embedding, EmbeddingSubject, Metadata, MetadataValue,
    RetrievalResult, VECTOR_SOURCE,
};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorCause, RagError, Result, Stage};
pub use hybrid::{HYBRID_SOURCE, HybridVectorStore, HybridVectorStoreBuilder};
pub use inmemory::InMemoryVectorStore;
pub use llm::{Llm, TokenStream};
pub use loader::{DocumentLoader, TextLoader, path_document_id};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use query::{AnswerStream, QueryOptions};
pub use report::{DocumentReport, IngestStatus, IngestionReport, SourceReport, StageFailure};
pub use reranker::Reranker;
pub use tokio_util::sync::CancellationToken;
pub use vectorstore::VectorStore;
