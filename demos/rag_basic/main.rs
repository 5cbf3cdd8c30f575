//! # RAG Basic Example
//!
//! Ingests a few inline documents, then streams an answer to a question.
//!
//! Uses `InMemoryVectorStore`, `SentenceChunker`, a bag-of-words
//! `MockEmbeddingProvider` and an `EchoLlm`, so it runs with **zero API keys**.
//!
//! Run: `cargo run -p ragport-demos --example rag_basic`
//! Set `RUST_LOG=ragport=debug` to watch each pipeline stage.

use std::io::Write;
use std::sync::Arc;

use futures::{StreamExt, stream};
use ragport::{
    CancellationToken, DocumentSource, EmbeddingProvider, InMemoryVectorStore, Llm, PromptContext,
    QueryOptions, RagPipeline, SentenceChunker, TextLoader, TokenStream,
};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: hashed bag-of-words vectors
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> ragport::Result<Vec<f32>> {
        // Each word lands in a bucket picked by its hash, so texts sharing
        // words point in similar directions.
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock-bow"
    }
}

// ---------------------------------------------------------------------------
// EchoLlm: "answers" by quoting the best passage word by word
// ---------------------------------------------------------------------------

struct EchoLlm;

#[async_trait::async_trait]
impl Llm for EchoLlm {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate_stream(
        &self,
        context: PromptContext,
        _cancel: CancellationToken,
    ) -> ragport::Result<TokenStream> {
        let answer = match context.entries().first() {
            Some(best) => format!("According to my sources: {}", best.chunk.content.trim()),
            None => "I don't have anything on that.".to_string(),
        };
        let tokens: Vec<ragport::Result<String>> =
            answer.split_inclusive(' ').map(|t| Ok(t.to_string())).collect();
        Ok(Box::pin(stream::iter(tokens)))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // -- 1. Build the pipeline with in-memory components ------------------
    // SentenceChunker keeps chunks under 200 characters and prefers to cut
    // at sentence ends; 20 characters of overlap carry context across cuts.
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = RagPipeline::builder()
        .document_loader(Arc::new(TextLoader::new()))
        .chunker(Arc::new(SentenceChunker))
        .embedding_provider(Arc::new(MockEmbeddingProvider { dimensions: 64 }))
        .vector_store(store.clone())
        .llm(Arc::new(EchoLlm))
        .collection("knowledge_base")
        .chunk_size(200)
        .chunk_overlap(20)
        .top_k(3)
        .build()?;

    // -- 2. Ingest sample documents ---------------------------------------
    let sources = vec![
        DocumentSource::inline(
            "rust",
            "Rust is a systems programming language focused on safety, speed, and concurrency. \
             It achieves memory safety without a garbage collector through its ownership system.",
        ),
        DocumentSource::inline(
            "python",
            "Python is a high-level, interpreted programming language known for its readability \
             and versatility. It is widely used in data science, web development, and automation.",
        ),
        DocumentSource::inline(
            "rag",
            "Retrieval-Augmented Generation combines a retrieval system with a language model. \
             Documents are chunked, embedded, and stored in a vector database. At query time the \
             most relevant chunks are retrieved and fed to the model as context.",
        ),
        DocumentSource::path("does/not/exist.md"),
    ];

    let report = pipeline.ingest(sources, None).await?;
    for source in &report.sources {
        let chunks: usize = source.documents.iter().map(|d| d.chunks).sum();
        match &source.failure {
            None => println!("  {:<20} {:?} ({chunks} chunks)", source.source, source.status),
            Some(failure) => println!(
                "  {:<20} {:?} at {}: {}",
                source.source, source.status, failure.stage, failure.message
            ),
        }
    }
    println!("Stored {} chunks\n", store.len("knowledge_base").await);

    // -- 3. Stream answers ------------------------------------------------
    let questions =
        ["How does Rust achieve memory safety?", "What is retrieval-augmented generation?"];
    for question in questions {
        println!("Q: {question}");
        let mut answer = pipeline.query_stream(question, QueryOptions::new()).await?;

        for (rank, entry) in answer.context().entries().iter().enumerate() {
            println!("  [{}] {} (score {:.3})", rank + 1, entry.chunk.id, entry.score);
        }

        print!("A: ");
        while let Some(token) = answer.next().await {
            print!("{}", token?);
            std::io::stdout().flush()?;
        }
        println!("\n");
    }

    Ok(())
}
