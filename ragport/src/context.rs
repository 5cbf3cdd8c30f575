//! Prompt context assembly.

use serde::Serialize;

use crate::config::{CONTEXT_PLACEHOLDER, ContextBudget, DEFAULT_SYSTEM_PROMPT};
use crate::document::{MetadataValue, RetrievalResult};

/// Rendered in place of the context block when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str = "No relevant context found.";

/// The retrieved material plus the question, handed to the [`Llm`](crate::Llm).
///
/// Built fresh for every query and immutable afterwards. Entries keep the
/// ranking they had after retrieval and reranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptContext {
    question: String,
    entries: Vec<RetrievalResult>,
    truncated: usize,
    template: String,
}

impl PromptContext {
    /// Build a context with the default system prompt and no budget.
    pub fn new(question: impl Into<String>, entries: Vec<RetrievalResult>) -> Self {
        Self::assemble(question, entries, &ContextBudget::unbounded(), DEFAULT_SYSTEM_PROMPT)
    }

    /// Build a context, dropping the lowest-ranked entries that do not fit `budget`.
    pub fn assemble(
        question: impl Into<String>,
        results: Vec<RetrievalResult>,
        budget: &ContextBudget,
        template: &str,
    ) -> Self {
        let total = results.len();
        let mut chars = 0usize;
        let mut entries = Vec::with_capacity(total);

        for result in results {
            if budget.max_chunks.is_some_and(|max| entries.len() >= max) {
                break;
            }
            let len = result.chunk.content.chars().count();
            if budget.max_chars.is_some_and(|max| chars + len > max) {
                break;
            }
            chars += len;
            entries.push(result);
        }

        let truncated = total - entries.len();
        Self { question: question.into(), entries, truncated, template: template.to_string() }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn entries(&self) -> &[RetrievalResult] {
        &self.entries
    }

    /// Number of retrieved results dropped to respect the budget.
    pub fn truncated(&self) -> usize {
        self.truncated
    }

    /// `true` when no retrieved material made it into the context.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the numbered context block, or [`NO_CONTEXT_MARKER`] if empty.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return NO_CONTEXT_MARKER.to_string();
        }

        self.entries
            .iter()
            .enumerate()
            .map(|(i, result)| {
                let label = match result.chunk.metadata.get("file_name") {
                    Some(MetadataValue::String(name)) => name.as_str(),
                    _ => result.chunk.document_id.as_str(),
                };
                format!(
                    "[{}] (Source: {label}, Score: {:.3})\n{}",
                    i + 1,
                    result.score,
                    result.chunk.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The system prompt with the rendered context substituted in.
    pub fn system_prompt(&self) -> String {
        self.template.replace(CONTEXT_PLACEHOLDER, &self.render())
    }
}
