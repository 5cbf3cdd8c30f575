//! Ingestion orchestrator: load → chunk → embed → store.
//!
//! Sources are processed with bounded concurrency and isolated from each
//! other: a failure is recorded in the [`IngestionReport`] and never stops
//! sibling sources. Within a source, documents run one after another, and a
//! document's chunks are written only after its whole batch embedded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{StreamExt, stream};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::chunking::{ChunkParams, Chunker};
use crate::config::RagConfig;
use crate::deadline::within;
use crate::document::{Chunk, Document, DocumentSource, Embedding};
use crate::embedding::EmbeddingProvider;
use crate::error::{ErrorCause, RagError, Result, Stage};
use crate::loader::DocumentLoader;
use crate::report::{DocumentReport, IngestionReport, SourceReport, StageFailure};
use crate::vectorstore::VectorStore;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome of `ensure_collection` for one run.
///
/// Holds `Ok` once the collection exists, or the fatal failure that every
/// later document reports without touching the embedder or the store.
/// Transient failures leave the cell empty so the next document tries again.
type CollectionGate = OnceCell<std::result::Result<(), StageFailure>>;

pub(crate) struct IngestionOrchestrator {
    pub(crate) config: Arc<RagConfig>,
    pub(crate) loader: Arc<dyn DocumentLoader>,
    pub(crate) chunker: Arc<dyn Chunker>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) store: Arc<dyn VectorStore>,
}

impl IngestionOrchestrator {
    pub(crate) async fn run(
        &self,
        sources: Vec<DocumentSource>,
        collection: &str,
    ) -> IngestionReport {
        let started_at = Utc::now();
        let source_count = sources.len();
        let gate = CollectionGate::new();

        let reports: Vec<SourceReport> = stream::iter(sources)
            .map(|source| self.ingest_source(source, collection, &gate))
            .buffered(self.config.concurrency)
            .collect()
            .await;

        let report = IngestionReport {
            collection: collection.to_string(),
            started_at,
            finished_at: Utc::now(),
            sources: reports,
        };
        info!(
            collection,
            source_count,
            succeeded = report.succeeded().len(),
            partial = report.partial().len(),
            failed = report.failed().len(),
            chunk_count = report.total_chunks(),
            "ingestion finished"
        );
        report
    }

    async fn ingest_source(
        &self,
        source: DocumentSource,
        collection: &str,
        gate: &CollectionGate,
    ) -> SourceReport {
        let label = source.to_string();
        let load = self.loader.load(&source);
        let loaded = within(self.config.step_timeout, Stage::Load, self.loader.name(), load).await;
        let documents = match loaded {
            Ok(documents) => documents,
            Err(e) => {
                warn!(source = %label, error = %e, "failed to load source");
                return SourceReport::load_failed(label, StageFailure::new(Stage::Load, &e));
            }
        };
        debug!(source = %label, document_count = documents.len(), "loaded source");

        let mut reports = Vec::with_capacity(documents.len());
        for document in &documents {
            reports.push(self.ingest_document(document, collection, gate).await);
        }
        SourceReport::from_documents(label, reports)
    }

    async fn ingest_document(
        &self,
        document: &Document,
        collection: &str,
        gate: &CollectionGate,
    ) -> DocumentReport {
        let mut report = DocumentReport::loaded(&document.id);
        match self.process(document, collection, gate, &mut report).await {
            Ok(()) => {
                info!(
                    document.id = %document.id,
                    collection,
                    chunk_count = report.chunks,
                    "ingested document"
                );
            }
            Err(failure) => {
                warn!(
                    document.id = %document.id,
                    stage = %failure.stage,
                    error = %failure.message,
                    "document ingestion failed"
                );
                report.failure = Some(failure);
            }
        }
        report
    }

    async fn process(
        &self,
        document: &Document,
        collection: &str,
        gate: &CollectionGate,
        report: &mut DocumentReport,
    ) -> std::result::Result<(), StageFailure> {
        let params = ChunkParams::from(self.config.as_ref());
        let chunks = self
            .chunker
            .split(document, &params)
            .map_err(|e| StageFailure::new(Stage::Chunk, &e))?;
        report.chunks = chunks.len();
        report.completed_stages.push(Stage::Chunk);

        if chunks.is_empty() {
            debug!(document.id = %document.id, "document has no text; nothing to store");
            report.completed_stages.extend([Stage::Embed, Stage::Store]);
            return Ok(());
        }

        if let Some(Err(failure)) = gate.get() {
            debug!(document.id = %document.id, collection, "collection unusable; skipping");
            return Err(failure.clone());
        }

        let records = self
            .embed_chunks(&document.id, chunks)
            .await
            .map_err(|e| StageFailure::new(Stage::Embed, &e))?;
        report.completed_stages.push(Stage::Embed);

        self.ensure_collection(collection, gate).await?;

        let timeout = self.config.step_timeout;
        within(timeout, Stage::Store, self.store.name(), self.store.upsert(collection, &records))
            .await
            .map_err(|e| StageFailure::new(Stage::Store, &e))?;
        report.completed_stages.push(Stage::Store);
        Ok(())
    }

    /// Create the collection at most once per run.
    ///
    /// A [`RagError::Configuration`] (such as a dimensionality mismatch) is
    /// fatal and remembered; any other error is returned to this document
    /// only.
    async fn ensure_collection(
        &self,
        collection: &str,
        gate: &CollectionGate,
    ) -> std::result::Result<(), StageFailure> {
        let dimensions = self.embedder.dimensions();
        let timeout = self.config.step_timeout;
        let outcome = gate
            .get_or_try_init(|| async {
                let call = self.store.ensure_collection(collection, dimensions);
                match within(timeout, Stage::Store, self.store.name(), call).await {
                    Ok(()) => Ok(Ok(())),
                    Err(e @ RagError::Configuration(_)) => {
                        warn!(collection, dimensions, error = %e, "collection unusable");
                        Ok(Err(StageFailure::new(Stage::Store, &e)))
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(|e| StageFailure::new(Stage::Store, &e))?;
        outcome.clone()
    }

    /// Embed every chunk of one document, or none of them.
    async fn embed_chunks(
        &self,
        document_id: &str,
        chunks: Vec<Chunk>,
    ) -> Result<Vec<(Chunk, Embedding)>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embed_with_retry(document_id, &texts).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::embedding(
                self.embedder.name(),
                ErrorCause::InvalidResponse,
                format!("expected {} embeddings, got {}", chunks.len(), vectors.len()),
            ));
        }
        let dimensions = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(RagError::embedding(
                self.embedder.name(),
                ErrorCause::InvalidResponse,
                format!("embedding has {} dimensions, provider reports {dimensions}", bad.len()),
            ));
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let embedding = Embedding::for_chunk(&chunk, vector);
                (chunk, embedding)
            })
            .collect())
    }

    async fn embed_with_retry(&self, document_id: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            let call = self.embedder.embed_batch(texts);
            match within(self.config.step_timeout, Stage::Embed, self.embedder.name(), call).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < self.config.embed_retries => {
                    attempt += 1;
                    warn!(
                        document.id = document_id,
                        attempt,
                        error = %e,
                        "retrying batch embedding"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt as u32).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
