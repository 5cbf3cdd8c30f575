//! Query orchestrator: embed → retrieve → rerank → assemble → generate.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::context::PromptContext;
use crate::deadline::within;
use crate::document::{Embedding, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{ErrorCause, RagError, Result, Stage};
use crate::llm::{Llm, TokenStream};
use crate::reranker::Reranker;
use crate::vectorstore::VectorStore;

/// Per-call overrides for [`RagPipeline::query_stream`](crate::RagPipeline::query_stream).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Overrides the configured `top_k`.
    pub top_k: Option<usize>,
    /// Overrides the configured collection.
    pub collection: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }
}

/// Streamed answer to a question.
///
/// Yields tokens in generation order. An `Err` item ends the stream. Dropping
/// the stream before it is exhausted cancels the underlying generation.
///
/// # Example
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut answer = pipeline.query_stream("Why is the sky blue?", QueryOptions::new()).await?;
/// while let Some(token) = answer.next().await {
///     print!("{}", token?);
/// }
/// ```
pub struct AnswerStream {
    tokens: TokenStream,
    context: PromptContext,
    cancel: CancellationToken,
    finished: bool,
}

impl AnswerStream {
    fn new(tokens: TokenStream, context: PromptContext, cancel: CancellationToken) -> Self {
        Self { tokens, context, cancel, finished: false }
    }

    /// The context the answer is grounded on.
    pub fn context(&self) -> &PromptContext {
        &self.context
    }

    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut answer = String::new();
        while let Some(token) = self.next().await {
            answer.push_str(&token?);
        }
        Ok(answer)
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.tokens.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(token))) => Poll::Ready(Some(Ok(token))),
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                self.cancel.cancel();
                error!(error = %e, "answer generation failed mid-stream");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                debug!("answer stream complete");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!("answer stream dropped early; cancelling generation");
            self.cancel.cancel();
        }
    }
}

/// Fail the stream if the next token takes longer than `limit`.
fn idle_deadline(tokens: TokenStream, limit: Option<Duration>, model: String) -> TokenStream {
    let Some(limit) = limit else {
        return tokens;
    };
    Box::pin(async_stream::stream! {
        let mut tokens = tokens;
        loop {
            match tokio::time::timeout(limit, tokens.next()).await {
                Ok(Some(item)) => yield item,
                Ok(None) => break,
                Err(_) => {
                    yield Err(RagError::timed_out(Stage::Generate, &model, limit));
                    break;
                }
            }
        }
    })
}

pub(crate) struct QueryOrchestrator {
    pub(crate) config: Arc<RagConfig>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) reranker: Option<Arc<dyn Reranker>>,
    pub(crate) llm: Arc<dyn Llm>,
}

impl QueryOrchestrator {
    pub(crate) async fn run(&self, question: &str, options: &QueryOptions) -> Result<AnswerStream> {
        let top_k = options.top_k.unwrap_or(self.config.top_k);
        if top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        let collection = match options.collection.as_deref() {
            Some(name) if name.trim().is_empty() => {
                return Err(RagError::Configuration(
                    "collection name must not be empty".to_string(),
                ));
            }
            Some(name) => name,
            None => self.config.collection.as_str(),
        };

        let context = self
            .prepare(question, collection, top_k)
            .await
            .inspect_err(|e| error!(collection, error = %e, "query failed before generation"))?;

        let cancel = CancellationToken::new();
        let timeout = self.config.step_timeout;
        let call = self.llm.generate_stream(context.clone(), cancel.clone());
        let started = within(timeout, Stage::Generate, self.llm.name(), call).await;
        let tokens = match started {
            Ok(tokens) => tokens,
            Err(e) => {
                cancel.cancel();
                error!(model = self.llm.name(), error = %e, "failed to start generation");
                return Err(e);
            }
        };

        info!(
            collection,
            context_count = context.entries().len(),
            model = self.llm.name(),
            "streaming answer"
        );
        let tokens = idle_deadline(tokens, timeout, self.llm.name().to_string());
        Ok(AnswerStream::new(tokens, context, cancel))
    }

    async fn prepare(
        &self,
        question: &str,
        collection: &str,
        top_k: usize,
    ) -> Result<PromptContext> {
        let timeout = self.config.step_timeout;

        let embed = self.embedder.embed(question);
        let vector = within(timeout, Stage::Embed, self.embedder.name(), embed).await?;
        let dimensions = self.embedder.dimensions();
        if vector.len() != dimensions {
            return Err(RagError::embedding(
                self.embedder.name(),
                ErrorCause::InvalidResponse,
                format!(
                    "query embedding has {} dimensions, provider reports {dimensions}",
                    vector.len()
                ),
            ));
        }
        let query = Embedding::for_query(question, vector);

        let search = self.store.query(collection, &query, top_k);
        let mut results = within(timeout, Stage::Store, self.store.name(), search).await?;
        results.truncate(top_k);
        debug!(collection, result_count = results.len(), "retrieved candidates");

        if let Some(reranker) = self.reranker.as_ref().filter(|_| self.config.rerank_enabled) {
            let rerank = reranker.rerank(question, results);
            results = within(timeout, Stage::Rerank, reranker.name(), rerank).await?;
            debug!(
                reranker = reranker.name(),
                result_count = results.len(),
                "reranked candidates"
            );
        }

        if let Some(threshold) = self.config.similarity_threshold {
            results.retain(|r: &RetrievalResult| r.score >= threshold);
        }

        let context = PromptContext::assemble(
            question,
            results,
            &self.config.context_budget,
            &self.config.system_prompt,
        );
        if context.truncated() > 0 {
            debug!(dropped = context.truncated(), "context budget dropped lowest-ranked results");
        }
        if context.is_empty() {
            debug!(collection, "no relevant context; generating without retrieved material");
        }
        Ok(context)
    }
}
