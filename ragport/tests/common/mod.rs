//! Shared mock ports for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use ragport::{
    CancellationToken, Chunker, DocumentLoader, EmbeddingProvider, ErrorCause, InMemoryVectorStore,
    Llm, PromptContext, RagError, RagPipeline, RagPipelineBuilder, Reranker, Result,
    RetrievalResult, SentenceChunker, TextLoader, TokenStream, VectorStore,
};

pub const VOCABULARY: &[&str] = &["sky", "blue", "grass", "green", "sun", "ocean"];

/// Counts vocabulary words; the trailing constant keeps vectors non-zero.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self { vocabulary: VOCABULARY.to_vec() }
    }
}

impl KeywordEmbedder {
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> =
            self.vocabulary.iter().map(|w| lower.matches(w).count() as f32).collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len() + 1
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Fails every text containing `marker`, counting batch calls.
pub struct PoisonEmbedder {
    inner: KeywordEmbedder,
    marker: &'static str,
    pub batches: AtomicUsize,
}

impl PoisonEmbedder {
    pub fn new(marker: &'static str) -> Self {
        Self { inner: KeywordEmbedder::default(), marker, batches: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for PoisonEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(self.marker) {
            return Err(RagError::embedding(
                "poison",
                ErrorCause::Unavailable,
                "provider unavailable",
            ));
        }
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "poison"
    }
}

/// Fails the first `failures` batch calls with a transient error.
pub struct FlakyEmbedder {
    inner: KeywordEmbedder,
    failures: usize,
    pub batches: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(failures: usize) -> Self {
        Self { inner: KeywordEmbedder::default(), failures, batches: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.batches.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RagError::embedding("flaky", ErrorCause::Timeout, "request timed out"));
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.inner.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Streams fixed tokens, optionally ending with an error, and records every context.
#[derive(Default)]
pub struct ScriptedLlm {
    tokens: Vec<String>,
    fail_at_end: bool,
    pub contexts: Mutex<Vec<PromptContext>>,
}

impl ScriptedLlm {
    pub fn new(tokens: &[&str]) -> Self {
        Self { tokens: tokens.iter().map(|t| t.to_string()).collect(), ..Default::default() }
    }

    pub fn failing_after(tokens: &[&str]) -> Self {
        Self { fail_at_end: true, ..Self::new(tokens) }
    }

    pub fn last_context(&self) -> Option<PromptContext> {
        self.contexts.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(
        &self,
        context: PromptContext,
        _cancel: CancellationToken,
    ) -> Result<TokenStream> {
        self.contexts.lock().unwrap().push(context);
        let mut items: Vec<Result<String>> = self.tokens.iter().cloned().map(Ok).collect();
        if self.fail_at_end {
            let reset =
                RagError::generation("scripted", ErrorCause::Unavailable, "connection reset");
            items.push(Err(reset));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Yields one token, then never finishes. Keeps the cancellation token it was given.
#[derive(Default)]
pub struct HangingLlm {
    pub cancel: Mutex<Option<CancellationToken>>,
}

impl HangingLlm {
    pub fn token(&self) -> Option<CancellationToken> {
        self.cancel.lock().unwrap().clone()
    }
}

#[async_trait]
impl Llm for HangingLlm {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate_stream(
        &self,
        _context: PromptContext,
        cancel: CancellationToken,
    ) -> Result<TokenStream> {
        *self.cancel.lock().unwrap() = Some(cancel);
        let first = stream::once(async { Ok("thinking".to_string()) });
        Ok(Box::pin(futures::StreamExt::chain(first, stream::pending())))
    }
}

/// Reverses the ranking and counts calls.
#[derive(Default)]
pub struct ReverseReranker {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Reranker for ReverseReranker {
    async fn rerank(
        &self,
        _question: &str,
        mut results: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        results.reverse();
        Ok(results)
    }

    fn name(&self) -> &str {
        "reverse"
    }
}

/// A builder with every required port set to a working mock.
pub fn builder(store: Arc<InMemoryVectorStore>, llm: Arc<dyn Llm>) -> RagPipelineBuilder {
    let loader: Arc<dyn DocumentLoader> = Arc::new(TextLoader::new());
    let chunker: Arc<dyn Chunker> = Arc::new(SentenceChunker);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder::default());
    let store: Arc<dyn VectorStore> = store;
    RagPipeline::builder()
        .document_loader(loader)
        .chunker(chunker)
        .embedding_provider(embedder)
        .vector_store(store)
        .llm(llm)
        .collection("test")
        .chunk_size(20)
        .chunk_overlap(0)
}

pub const SKY: &str = "The sky is blue. Grass is green.";
