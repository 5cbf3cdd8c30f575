//! Document loader port and a plain-text loader.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::document::{Document, DocumentSource, Element, Metadata};
use crate::error::{ErrorCause, RagError, Result};

/// Reads a [`DocumentSource`] into one or more [`Document`]s.
///
/// A single source may expand into several documents (a directory, an
/// archive, a multi-page export). Document IDs must be stable so that
/// re-ingesting the same source overwrites instead of duplicating.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every document behind `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if the source is unreadable or of an
    /// unsupported format.
    async fn load(&self, source: &DocumentSource) -> Result<Vec<Document>>;

    /// Name used in errors and logs.
    fn name(&self) -> &str {
        "loader"
    }
}

/// Derive a stable document ID from a path.
pub fn path_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("doc-{}", &hash[..16])
}

/// Loads UTF-8 text files (`.txt` and `.md` by default) and inline payloads.
///
/// Directories are walked recursively; files with other extensions are
/// skipped and the rest are loaded in sorted path order. `file://` URIs are
/// treated as paths; other URI schemes are unsupported.
///
/// # Example
///
/// ```rust,ignore
/// use ragport::{DocumentLoader, DocumentSource, TextLoader};
///
/// let docs = TextLoader::new().load(&DocumentSource::path("notes/")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TextLoader {
    extensions: Vec<String>,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self { extensions: vec!["txt".to_string(), "md".to_string()] }
    }
}

impl TextLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted file extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| {
                let ext: String = e.into();
                ext.trim_start_matches('.').to_lowercase()
            })
            .collect();
        self
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    async fn load_path(&self, path: &Path) -> Result<Vec<Document>> {
        let location = path.display().to_string();
        let meta = tokio::fs::metadata(path).await.map_err(|e| io_error(&location, &e))?;

        if !meta.is_dir() {
            return Ok(vec![self.load_file(path).await?]);
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = entry.map_err(|e| walk_error(&location, &e))?;
            if entry.file_type().is_file() && self.supports(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        debug!(directory = %location, file_count = files.len(), "walked directory source");

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            documents.push(self.load_file(&file).await?);
        }
        Ok(documents)
    }

    async fn load_file(&self, path: &Path) -> Result<Document> {
        let location = path.display().to_string();
        if !self.supports(path) {
            return Err(RagError::load(
                location,
                ErrorCause::Unsupported,
                format!("unsupported file extension (accepted: {})", self.extensions.join(", ")),
            ));
        }

        let text = tokio::fs::read_to_string(path).await.map_err(|e| io_error(&location, &e))?;

        let mut metadata = Metadata::new();
        metadata.insert("source_file".to_string(), location.clone().into());
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".to_string(), name.into());
        }
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext = format!(".{}", ext.to_lowercase());
            metadata.insert("file_extension".to_string(), ext.into());
        }

        Ok(Document { id: path_document_id(path), elements: vec![Element::Text(text)], metadata })
    }
}

fn io_error(location: &str, err: &std::io::Error) -> RagError {
    let cause = match err.kind() {
        ErrorKind::NotFound | ErrorKind::InvalidData => ErrorCause::InvalidInput,
        ErrorKind::PermissionDenied => ErrorCause::Unauthorized,
        ErrorKind::TimedOut => ErrorCause::Timeout,
        _ => ErrorCause::Other,
    };
    RagError::load(location, cause, err.to_string())
}

/// A failed directory entry (dangling link, link loop, unreadable subdirectory).
fn walk_error(root: &str, err: &walkdir::Error) -> RagError {
    let location = err.path().map_or_else(|| root.to_string(), |p| p.display().to_string());
    match err.io_error() {
        Some(io) => io_error(&location, io),
        None => RagError::load(location, ErrorCause::InvalidInput, err.to_string()),
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, source: &DocumentSource) -> Result<Vec<Document>> {
        match source {
            DocumentSource::Inline { id, text, metadata } => Ok(vec![Document {
                id: id.clone(),
                elements: vec![Element::Text(text.clone())],
                metadata: metadata.clone(),
            }]),
            DocumentSource::Path(path) => self.load_path(path).await,
            DocumentSource::Uri(uri) => match uri.strip_prefix("file://") {
                Some(path) => self.load_path(Path::new(path)).await,
                None => Err(RagError::load(
                    uri.as_str(),
                    ErrorCause::Unsupported,
                    "only file:// URIs are supported",
                )),
            },
        }
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MetadataValue;
    use std::fs;

    #[tokio::test]
    async fn loads_a_text_file_with_stable_id() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "The sky is blue.").unwrap();

        let loader = TextLoader::new();
        let first = loader.load(&DocumentSource::path(&path)).await.unwrap();
        let second = loader.load(&DocumentSource::path(&path)).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert!(first[0].id.starts_with("doc-"));
        assert_eq!(first[0].text_content(), "The sky is blue.");
        assert_eq!(first[0].metadata["file_name"], MetadataValue::from("notes.txt"));
        assert_eq!(first[0].metadata["file_extension"], MetadataValue::from(".txt"));
    }

    #[tokio::test]
    async fn walks_directories_keeping_supported_files_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.md"), "# B").unwrap();
        fs::write(root.join("nested/a.txt"), "A").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = TextLoader::new().load(&DocumentSource::path(root)).await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.metadata["file_name"].to_string()).collect();
        assert_eq!(names, vec!["b.md", "a.txt"]);
    }

    #[tokio::test]
    async fn rejects_unsupported_extension_and_scheme() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("data.csv");
        fs::write(&path, "a,b").unwrap();

        let loader = TextLoader::new();
        let err = loader.load(&DocumentSource::path(&path)).await.unwrap_err();
        assert_eq!(err.cause(), Some(ErrorCause::Unsupported));

        let remote = DocumentSource::Uri("https://example.com/a.txt".into());
        let err = loader.load(&remote).await.unwrap_err();
        assert!(matches!(err, RagError::Load { cause: ErrorCause::Unsupported, .. }));
    }

    #[tokio::test]
    async fn file_uri_and_custom_extensions() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("data.csv");
        fs::write(&path, "a,b").unwrap();

        let loader = TextLoader::new().with_extensions([".csv"]);
        let uri = format!("file://{}", path.display());
        let docs = loader.load(&DocumentSource::Uri(uri)).await.unwrap();
        assert_eq!(docs[0].text_content(), "a,b");
    }

    #[tokio::test]
    async fn missing_path_is_a_load_error() {
        let missing = DocumentSource::path("/definitely/not/here.txt");
        let err = TextLoader::new().load(&missing).await.unwrap_err();
        assert_eq!(err.stage(), Some(crate::Stage::Load));
        assert_eq!(err.cause(), Some(ErrorCause::InvalidInput));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_link_fails_the_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("good.txt"), "Grass is green.").unwrap();
        std::os::unix::fs::symlink(root.join("gone.txt"), root.join("link.txt")).unwrap();

        let err = TextLoader::new().load(&DocumentSource::path(root)).await.unwrap_err();
        assert_eq!(err.stage(), Some(crate::Stage::Load));
        assert_eq!(err.cause(), Some(ErrorCause::InvalidInput));
        assert!(err.to_string().contains("link.txt"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn link_loop_fails_the_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested/a.txt"), "A").unwrap();
        std::os::unix::fs::symlink(root, root.join("nested/back")).unwrap();

        let err = TextLoader::new().load(&DocumentSource::path(root)).await.unwrap_err();
        assert!(matches!(err, RagError::Load { cause: ErrorCause::InvalidInput, .. }));
    }

    #[tokio::test]
    async fn inline_sources_keep_caller_id() {
        let docs = TextLoader::new().load(&DocumentSource::inline("faq", "Q and A")).await.unwrap();
        assert_eq!(docs[0].id, "faq");
    }
}
