//! Query: retrieval, reranking, context assembly and answer streaming.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{
    HangingLlm, KeywordEmbedder, PoisonEmbedder, ReverseReranker, SKY, ScriptedLlm, builder,
};
use futures::StreamExt;
use ragport::{
    ContextBudget, DocumentSource, Embedding, ErrorCause, InMemoryVectorStore, NO_CONTEXT_MARKER,
    QueryOptions, RagError, RagPipeline, Stage, VectorStore,
};

fn corpus() -> Vec<DocumentSource> {
    vec![
        DocumentSource::inline("sky", SKY),
        DocumentSource::inline("ocean", "The ocean is blue."),
        DocumentSource::inline("sun", "The sun is bright."),
    ]
}

async fn ingested(pipeline: &RagPipeline) {
    let report = pipeline.ingest(corpus(), None).await.unwrap();
    assert!(report.is_complete());
}

fn ids(entries: &[ragport::RetrievalResult]) -> Vec<String> {
    entries.iter().map(|r| r.chunk.id.clone()).collect()
}

#[tokio::test]
async fn without_reranker_context_follows_store_ranking() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = builder(store.clone(), Arc::new(ScriptedLlm::new(&["ok"]))).build().unwrap();
    ingested(&pipeline).await;

    let question = "Is the sky blue?";
    let expected = {
        let vector = KeywordEmbedder::default().vectorize(question);
        store.query("test", &Embedding::for_query(question, vector), 5).await.unwrap()
    };

    let answer = pipeline.query_stream(question, QueryOptions::new()).await.unwrap();
    assert_eq!(ids(answer.context().entries()), ids(&expected));
    assert_eq!(answer.context().entries()[0].chunk.id, "sky_0");
}

#[tokio::test]
async fn reranker_reorders_unless_disabled() {
    let store = Arc::new(InMemoryVectorStore::new());
    let reranker = Arc::new(ReverseReranker::default());
    let base = builder(store.clone(), Arc::new(ScriptedLlm::new(&["ok"])));

    let plain = base.build().unwrap();
    ingested(&plain).await;
    let baseline = plain.query_stream("blue sky", QueryOptions::new()).await.unwrap();
    let mut reversed = ids(baseline.context().entries());
    reversed.reverse();

    let reranked = base.clone().reranker(reranker.clone()).build().unwrap();
    let answer = reranked.query_stream("blue sky", QueryOptions::new()).await.unwrap();
    assert_eq!(ids(answer.context().entries()), reversed);
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 1);

    let disabled = base.reranker(reranker.clone()).rerank_enabled(false).build().unwrap();
    let answer = disabled.query_stream("blue sky", QueryOptions::new()).await.unwrap();
    assert_eq!(ids(answer.context().entries()), ids(baseline.context().entries()));
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_retrieval_still_generates_an_answer() {
    let llm = Arc::new(ScriptedLlm::new(&["I could not find ", "anything."]));
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), llm.clone()).build().unwrap();

    let question = "What is the capital of Mars?";
    let answer = pipeline.query_stream(question, QueryOptions::new()).await.unwrap();
    assert!(answer.context().is_empty());

    let text = answer.collect_text().await.unwrap();
    assert!(!text.is_empty());
    let seen = llm.last_context().unwrap();
    assert!(seen.system_prompt().contains(NO_CONTEXT_MARKER));
}

#[tokio::test]
async fn mid_stream_error_is_terminal() {
    let llm = Arc::new(ScriptedLlm::failing_after(&["a", "b"]));
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), llm).build().unwrap();

    let mut answer = pipeline.query_stream("anything", QueryOptions::new()).await.unwrap();
    assert_eq!(answer.next().await.unwrap().unwrap(), "a");
    assert_eq!(answer.next().await.unwrap().unwrap(), "b");
    let err = answer.next().await.unwrap().unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Generate));
    assert!(answer.next().await.is_none());
}

#[tokio::test]
async fn dropping_the_answer_cancels_generation() {
    let llm = Arc::new(HangingLlm::default());
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), llm.clone()).build().unwrap();

    let mut answer = pipeline.query_stream("anything", QueryOptions::new()).await.unwrap();
    assert_eq!(answer.next().await.unwrap().unwrap(), "thinking");

    let token = llm.token().unwrap();
    assert!(!token.is_cancelled());
    drop(answer);
    assert!(token.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_times_out() {
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), Arc::new(HangingLlm::default()))
        .step_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let mut answer = pipeline.query_stream("anything", QueryOptions::new()).await.unwrap();
    assert!(answer.next().await.unwrap().is_ok());
    let err = answer.next().await.unwrap().unwrap_err();
    assert!(matches!(err, RagError::Generation { cause: ErrorCause::Timeout, .. }));
    assert!(answer.next().await.is_none());
}

#[tokio::test]
async fn options_override_top_k_and_collection() {
    let llm = Arc::new(ScriptedLlm::new(&["ok"]));
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), llm).build().unwrap();
    ingested(&pipeline).await;

    let one = pipeline.query_stream("blue", QueryOptions::new().top_k(1)).await.unwrap();
    assert_eq!(one.context().entries().len(), 1);

    let options = QueryOptions::new().collection("empty");
    let elsewhere = pipeline.query_stream("blue", options).await.unwrap();
    assert!(elsewhere.context().is_empty());

    let err = pipeline.query_stream("blue", QueryOptions::new().top_k(0)).await.err().unwrap();
    assert!(matches!(err, RagError::Configuration(_)));
}

#[tokio::test]
async fn threshold_and_budget_trim_the_context() {
    let store = Arc::new(InMemoryVectorStore::new());
    let strict = builder(store.clone(), Arc::new(ScriptedLlm::new(&["ok"])))
        .similarity_threshold(0.99)
        .build()
        .unwrap();
    ingested(&strict).await;
    let answer = strict.query_stream("grass", QueryOptions::new()).await.unwrap();
    assert!(answer.context().is_empty());

    let budgeted = builder(store, Arc::new(ScriptedLlm::new(&["ok"])))
        .context_budget(ContextBudget::default().max_chunks(1))
        .build()
        .unwrap();
    let answer = budgeted.query_stream("blue", QueryOptions::new()).await.unwrap();
    assert_eq!(answer.context().entries().len(), 1);
    assert_eq!(answer.context().truncated(), 3);
}

#[tokio::test]
async fn failure_before_generation_is_returned_directly() {
    let llm = Arc::new(ScriptedLlm::new(&["never"]));
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), llm.clone())
        .embedding_provider(Arc::new(PoisonEmbedder::new("POISON")))
        .build()
        .unwrap();

    let err = pipeline.query_stream("POISON?", QueryOptions::new()).await.err().unwrap();
    assert_eq!(err.stage(), Some(Stage::Embed));
    assert_eq!(err.cause(), Some(ErrorCause::Unavailable));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn blank_collection_override_is_rejected_before_retrieval() {
    let llm = Arc::new(ScriptedLlm::new(&["never"]));
    let pipeline = builder(Arc::new(InMemoryVectorStore::new()), llm.clone())
        .embedding_provider(Arc::new(PoisonEmbedder::new("POISON")))
        .build()
        .unwrap();
    ingested(&pipeline).await;

    // Embedding this question would fail, so a Configuration error means
    // the override was checked first.
    for blank in ["", "   "] {
        let options = QueryOptions::new().collection(blank);
        let err = pipeline.query_stream("POISON?", options).await.err().unwrap();
        assert!(matches!(&err, RagError::Configuration(msg) if msg.contains("collection")));
    }
    assert_eq!(llm.calls(), 0);
}
