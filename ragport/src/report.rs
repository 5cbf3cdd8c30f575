//! Outcome of an ingestion run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ErrorCause, RagError, Stage};

/// Aggregate outcome for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Every document loaded from the source was stored.
    Succeeded,
    /// Some documents were stored, others failed.
    Partial,
    /// The source failed to load or none of its documents were stored.
    Failed,
}

/// Why a document or source stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub cause: Option<ErrorCause>,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, error: &RagError) -> Self {
        Self { stage, cause: error.cause(), message: error.to_string() }
    }
}

/// Progress of one document through chunk → embed → store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub document_id: String,
    /// Number of chunks produced (0 if chunking failed).
    pub chunks: usize,
    /// Stages the document got through, in order.
    pub completed_stages: Vec<Stage>,
    pub failure: Option<StageFailure>,
}

impl DocumentReport {
    pub(crate) fn loaded(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            chunks: 0,
            completed_stages: vec![Stage::Load],
            failure: None,
        }
    }

    /// `true` when every chunk of the document reached the store.
    pub fn is_stored(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome for one ingested source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    /// Display form of the [`DocumentSource`](crate::DocumentSource).
    pub source: String,
    pub status: IngestStatus,
    pub documents: Vec<DocumentReport>,
    /// The load failure, or the first document failure when not fully stored.
    pub failure: Option<StageFailure>,
}

impl SourceReport {
    pub(crate) fn load_failed(source: String, failure: StageFailure) -> Self {
        Self { source, status: IngestStatus::Failed, documents: Vec::new(), failure: Some(failure) }
    }

    pub(crate) fn from_documents(source: String, documents: Vec<DocumentReport>) -> Self {
        let stored = documents.iter().filter(|d| d.is_stored()).count();
        let status = if stored == documents.len() {
            IngestStatus::Succeeded
        } else if stored == 0 {
            IngestStatus::Failed
        } else {
            IngestStatus::Partial
        };
        let failure = documents.iter().find_map(|d| d.failure.clone());
        Self { source, status, documents, failure }
    }

    pub fn chunks_stored(&self) -> usize {
        self.documents.iter().filter(|d| d.is_stored()).map(|d| d.chunks).sum()
    }
}

/// Per-source outcomes of a single [`RagPipeline::ingest`](crate::RagPipeline::ingest) call,
/// in the order the sources were given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub collection: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl IngestionReport {
    fn with_status(&self, status: IngestStatus) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(move |s| s.status == status)
    }

    pub fn succeeded(&self) -> Vec<&SourceReport> {
        self.with_status(IngestStatus::Succeeded).collect()
    }

    pub fn partial(&self) -> Vec<&SourceReport> {
        self.with_status(IngestStatus::Partial).collect()
    }

    pub fn failed(&self) -> Vec<&SourceReport> {
        self.with_status(IngestStatus::Failed).collect()
    }

    /// Look up a source by its display form.
    pub fn source(&self, source: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == source)
    }

    pub fn total_chunks(&self) -> usize {
        self.sources.iter().map(SourceReport::chunks_stored).sum()
    }

    /// `true` when every source succeeded.
    pub fn is_complete(&self) -> bool {
        self.sources.iter().all(|s| s.status == IngestStatus::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, chunks: usize) -> DocumentReport {
        let mut report = DocumentReport::loaded(id);
        report.chunks = chunks;
        report.completed_stages.extend([Stage::Chunk, Stage::Embed, Stage::Store]);
        report
    }

    fn failed_at(id: &str, stage: Stage) -> DocumentReport {
        let mut report = DocumentReport::loaded(id);
        report.completed_stages.push(Stage::Chunk);
        let err = RagError::embedding("mock", ErrorCause::Unavailable, "down");
        report.failure = Some(StageFailure::new(stage, &err));
        report
    }

    #[test]
    fn status_reflects_stored_documents() {
        let all = SourceReport::from_documents("a".into(), vec![stored("1", 2), stored("2", 3)]);
        assert_eq!(all.status, IngestStatus::Succeeded);
        assert_eq!(all.chunks_stored(), 5);
        assert!(all.failure.is_none());

        let some = SourceReport::from_documents(
            "b".into(),
            vec![stored("1", 2), failed_at("2", Stage::Embed)],
        );
        assert_eq!(some.status, IngestStatus::Partial);
        assert_eq!(some.chunks_stored(), 2);
        assert_eq!(some.failure.as_ref().map(|f| f.stage), Some(Stage::Embed));

        let none = SourceReport::from_documents("c".into(), vec![failed_at("1", Stage::Embed)]);
        assert_eq!(none.status, IngestStatus::Failed);
        assert_eq!(none.documents[0].completed_stages, vec![Stage::Load, Stage::Chunk]);
    }

    #[test]
    fn empty_source_counts_as_succeeded() {
        let empty = SourceReport::from_documents("dir".into(), Vec::new());
        assert_eq!(empty.status, IngestStatus::Succeeded);
    }
}
