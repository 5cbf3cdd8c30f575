//! Language model port for streamed answer generation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::context::PromptContext;
use crate::error::Result;

/// A finite, non-restartable sequence of generated text tokens.
///
/// An `Err` item is terminal: consumers stop at the first error.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A language model that answers a [`PromptContext`] token by token.
///
/// `cancel` fires when the consumer abandons the answer before the stream is
/// exhausted. Implementations backed by a network stream should watch it
/// (for example with `tokio::select!`) and release the upstream request.
///
/// # Example
///
/// ```rust,ignore
/// use ragport::{Llm, PromptContext};
///
/// let mut tokens = llm.generate_stream(context, CancellationToken::new()).await?;
/// while let Some(token) = tokens.next().await {
///     print!("{}", token?);
/// }
/// ```
#[async_trait]
pub trait Llm: Send + Sync {
    /// Model name used in errors and logs.
    fn name(&self) -> &str;

    /// Start generating an answer.
    ///
    /// Failures before the first token are returned directly; later failures
    /// are yielded as the stream's final item.
    async fn generate_stream(
        &self,
        context: PromptContext,
        cancel: CancellationToken,
    ) -> Result<TokenStream>;
}
