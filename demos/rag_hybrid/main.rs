//! # RAG Hybrid Retrieval Example
//!
//! Combines dense vector search with a simple keyword index through
//! `HybridVectorStore`, and shows where each retrieved chunk came from.
//!
//! Run: `cargo run -p ragport-demos --example rag_hybrid`

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream;
use ragport::{
    CancellationToken, Chunk, DocumentSource, Embedding, EmbeddingProvider, EmbeddingSubject,
    HybridVectorStore, InMemoryVectorStore, Llm, PromptContext, QueryOptions, RagPipeline,
    RetrievalResult, SentenceChunker, TextLoader, TokenStream, VectorStore,
};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: hashed bag-of-words vectors
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> ragport::Result<Vec<f32>> {
        let mut emb = vec![0.0f32; 32];
        for word in words(text) {
            let hash =
                word.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % 32) as usize] += 1.0;
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        32
    }
}

// ---------------------------------------------------------------------------
// KeywordStore: scores chunks by the number of query words they contain
// ---------------------------------------------------------------------------

#[derive(Default)]
struct KeywordStore {
    chunks: RwLock<HashMap<String, Vec<Chunk>>>,
}

#[async_trait::async_trait]
impl VectorStore for KeywordStore {
    async fn ensure_collection(&self, collection: &str, _dimensions: usize) -> ragport::Result<()> {
        self.chunks.write().await.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        records: &[(Chunk, Embedding)],
    ) -> ragport::Result<()> {
        let mut collections = self.chunks.write().await;
        let chunks = collections.entry(collection.to_string()).or_default();
        for (chunk, _) in records {
            chunks.retain(|c| c.id != chunk.id);
            chunks.push(chunk.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &Embedding,
        top_k: usize,
    ) -> ragport::Result<Vec<RetrievalResult>> {
        let EmbeddingSubject::Query { text } = &embedding.subject else {
            return Ok(Vec::new());
        };
        let terms = words(text);
        let collections = self.chunks.read().await;
        let mut results: Vec<RetrievalResult> = collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter_map(|chunk| {
                let hits = words(&chunk.content).intersection(&terms).count();
                (hits > 0).then(|| RetrievalResult::new(chunk.clone(), hits as f32))
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

// ---------------------------------------------------------------------------
// EchoLlm: lists the passages it was given
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
        let tokens: Vec<ragport::Result<String>> = vec![Ok(format!(
            "I was given {} passage(s) for \"{}\".",
            context.entries().len(),
            context.question()
        ))];
        Ok(Box::pin(stream::iter(tokens)))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // -- 1. Combine a dense and a keyword store ---------------------------
    // Dense results count for 70% of the merged score, keyword hits for 30%.
    let store = HybridVectorStore::builder()
        .store("dense", Arc::new(InMemoryVectorStore::new()), 0.7)
        .store("keyword", Arc::new(KeywordStore::default()), 0.3)
        .build()?;

    let pipeline = RagPipeline::builder()
        .document_loader(Arc::new(TextLoader::new()))
        .chunker(Arc::new(SentenceChunker))
        .embedding_provider(Arc::new(MockEmbeddingProvider))
        .vector_store(Arc::new(store))
        .llm(Arc::new(EchoLlm))
        .collection("handbook")
        .chunk_size(120)
        .chunk_overlap(0)
        .build()?;

    // -- 2. Ingest --------------------------------------------------------
    let sources = vec![
        DocumentSource::inline(
            "leave",
            "Employees accrue two vacation days per month. \
             Unused vacation carries over for one year.",
        ),
        DocumentSource::inline(
            "expenses",
            "Travel expenses must be filed within thirty days. \
             Receipts are required for every claim.",
        ),
        DocumentSource::inline(
            "security",
            "Laptops must use full-disk encryption. \
             Report lost devices to the security team immediately.",
        ),
    ];
    let report = pipeline.ingest(sources, None).await?;
    println!(
        "Ingested {} chunks from {} sources\n",
        report.total_chunks(),
        report.succeeded().len()
    );

    // -- 3. Query and show which retrieval path found each chunk ----------
    let question = "How many vacation days do employees get?";
    let answer = pipeline.query_stream(question, QueryOptions::new().top_k(3)).await?;
    for entry in answer.context().entries() {
        let content = entry.chunk.content.trim();
        println!("  {:<12} {:<8} {:.3}  {content}", entry.chunk.id, entry.source, entry.score);
    }
    println!("\n{}", answer.collect_text().await?);

    Ok(())
}
