//! Error types for the `ragport` crate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pipeline step, used to attribute failures and progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Chunk,
    Embed,
    Store,
    Rerank,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Chunk => "chunk",
            Stage::Embed => "embed",
            Stage::Store => "store",
            Stage::Rerank => "rerank",
            Stage::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// Machine-readable reason attached to a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    /// The call exceeded its deadline.
    Timeout,
    /// The provider rejected the credentials.
    Unauthorized,
    /// The provider could not be reached or is overloaded.
    Unavailable,
    /// The request was rejected as malformed.
    InvalidInput,
    /// The provider answered with something the pipeline cannot use.
    InvalidResponse,
    /// The source or operation is not supported by the adapter.
    Unsupported,
    /// The consumer abandoned the operation.
    Cancelled,
    Other,
}

impl ErrorCause {
    /// Whether a failure with this cause may succeed when repeated.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorCause::Timeout | ErrorCause::Unavailable)
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCause::Timeout => "timeout",
            ErrorCause::Unauthorized => "unauthorized",
            ErrorCause::Unavailable => "unavailable",
            ErrorCause::InvalidInput => "invalid_input",
            ErrorCause::InvalidResponse => "invalid_response",
            ErrorCause::Unsupported => "unsupported",
            ErrorCause::Cancelled => "cancelled",
            ErrorCause::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A missing port or an invalid setting. Fatal and never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A source could not be read or is of an unsupported format.
    #[error("Load error ({location}, {cause}): {message}")]
    Load {
        /// The source that failed to load.
        location: String,
        cause: ErrorCause,
        message: String,
    },

    /// A document could not be split into chunks.
    #[error("Chunking error ({document_id}): {message}")]
    Chunking {
        /// The document that failed to split.
        document_id: String,
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}, {cause}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        cause: ErrorCause,
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}, {cause}): {message}")]
    Store {
        /// The vector store backend that produced the error.
        backend: String,
        cause: ErrorCause,
        message: String,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}, {cause}): {message}")]
    Rerank {
        /// The reranker that produced the error.
        reranker: String,
        cause: ErrorCause,
        message: String,
    },

    /// The language model failed to start or continue generation.
    #[error("Generation error ({model}, {cause}): {message}")]
    Generation {
        /// The model that produced the error.
        model: String,
        cause: ErrorCause,
        message: String,
    },
}

impl RagError {
    pub fn load(
        location: impl Into<String>,
        cause: ErrorCause,
        message: impl Into<String>,
    ) -> Self {
        Self::Load { location: location.into(), cause, message: message.into() }
    }

    pub fn chunking(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chunking { document_id: document_id.into(), message: message.into() }
    }

    pub fn embedding(
        provider: impl Into<String>,
        cause: ErrorCause,
        message: impl Into<String>,
    ) -> Self {
        Self::Embedding { provider: provider.into(), cause, message: message.into() }
    }

    pub fn store(
        backend: impl Into<String>,
        cause: ErrorCause,
        message: impl Into<String>,
    ) -> Self {
        Self::Store { backend: backend.into(), cause, message: message.into() }
    }

    pub fn rerank(
        reranker: impl Into<String>,
        cause: ErrorCause,
        message: impl Into<String>,
    ) -> Self {
        Self::Rerank { reranker: reranker.into(), cause, message: message.into() }
    }

    pub fn generation(
        model: impl Into<String>,
        cause: ErrorCause,
        message: impl Into<String>,
    ) -> Self {
        Self::Generation { model: model.into(), cause, message: message.into() }
    }

    /// Build the stage-specific error for a call that exceeded `limit`.
    ///
    /// Chunking is synchronous and never times out; a chunk-stage deadline
    /// is reported as a chunking error for completeness.
    pub fn timed_out(stage: Stage, component: &str, limit: Duration) -> Self {
        let message = format!("{stage} call exceeded {}ms", limit.as_millis());
        match stage {
            Stage::Load => Self::load(component, ErrorCause::Timeout, message),
            Stage::Chunk => Self::chunking(component, message),
            Stage::Embed => Self::embedding(component, ErrorCause::Timeout, message),
            Stage::Store => Self::store(component, ErrorCause::Timeout, message),
            Stage::Rerank => Self::rerank(component, ErrorCause::Timeout, message),
            Stage::Generate => Self::generation(component, ErrorCause::Timeout, message),
        }
    }

    /// The pipeline step that failed, or `None` for configuration errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RagError::Configuration(_) => None,
            RagError::Load { .. } => Some(Stage::Load),
            RagError::Chunking { .. } => Some(Stage::Chunk),
            RagError::Embedding { .. } => Some(Stage::Embed),
            RagError::Store { .. } => Some(Stage::Store),
            RagError::Rerank { .. } => Some(Stage::Rerank),
            RagError::Generation { .. } => Some(Stage::Generate),
        }
    }

    /// The machine-readable subcause, when the variant carries one.
    pub fn cause(&self) -> Option<ErrorCause> {
        match self {
            RagError::Configuration(_) | RagError::Chunking { .. } => None,
            RagError::Load { cause, .. }
            | RagError::Embedding { cause, .. }
            | RagError::Store { cause, .. }
            | RagError::Rerank { cause, .. }
            | RagError::Generation { cause, .. } => Some(*cause),
        }
    }

    /// Whether repeating the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.cause().is_some_and(ErrorCause::is_transient)
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
