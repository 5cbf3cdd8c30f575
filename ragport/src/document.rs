//! Value types flowing through the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{v}"),
            MetadataValue::Integer(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Key-value metadata attached to documents and chunks.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One part of a document's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Element {
    Text(String),
    /// A table serialized as text (for example markdown or CSV).
    Table(String),
    Image {
        mime_type: String,
        data: Vec<u8>,
    },
}

impl Element {
    /// The textual payload, if this element carries one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Element::Text(text) | Element::Table(text) => Some(text),
            Element::Image { .. } => None,
        }
    }
}

/// A source document produced by a [`DocumentLoader`](crate::DocumentLoader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the source path or supplied by the caller.
    pub id: String,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a single-element text document.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elements: vec![Element::Text(text.into())],
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The concatenated text of all text-bearing elements, joined by `\n`.
    pub fn text_content(&self) -> String {
        self.elements.iter().filter_map(Element::as_text).collect::<Vec<_>>().join("\n")
    }
}

/// A bounded sub-span of a [`Document`], the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}_{index}`; the upsert key in every vector store.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document.
    pub index: usize,
    pub content: String,
    /// Parent document metadata plus chunk-specific fields.
    pub metadata: Metadata,
}

impl Chunk {
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{document_id}_{index}")
    }
}

/// What an [`Embedding`] represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingSubject {
    Chunk { chunk_id: String },
    Query { text: String },
}

/// A vector plus a back-reference to the chunk or query it represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub subject: EmbeddingSubject,
}

impl Embedding {
    pub fn for_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self { vector, subject: EmbeddingSubject::Chunk { chunk_id: chunk.id.clone() } }
    }

    pub fn for_query(text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self { vector, subject: EmbeddingSubject::Query { text: text.into() } }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Retrieval path tag used by plain vector search.
pub const VECTOR_SOURCE: &str = "vector";

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// Which retrieval path produced this result.
    pub source: String,
}

impl RetrievalResult {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score, source: VECTOR_SOURCE.to_string() }
    }
}

/// Where a [`DocumentLoader`](crate::DocumentLoader) should read documents from.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    /// A file or a directory walked recursively.
    Path(PathBuf),
    Uri(String),
    /// A raw payload supplied by the caller.
    Inline { id: String, text: String, metadata: Metadata },
}

impl DocumentSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DocumentSource::Path(path.into())
    }

    pub fn inline(id: impl Into<String>, text: impl Into<String>) -> Self {
        DocumentSource::Inline { id: id.into(), text: text.into(), metadata: Metadata::new() }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => write!(f, "{}", path.display()),
            DocumentSource::Uri(uri) => f.write_str(uri),
            DocumentSource::Inline { id, .. } => write!(f, "inline:{id}"),
        }
    }
}
