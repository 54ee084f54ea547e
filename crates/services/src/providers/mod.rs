//! Provider contracts consumed by the workflow components.
//!
//! Providers are constructed by the caller and injected; no component
//! instantiates a client of its own.

use async_trait::async_trait;
use url::Url;

use tutor_core::model::ContextChunk;
use tutor_core::overlap;

use crate::error::ProviderError;

mod openai;
mod retry;
mod tavily;

pub use openai::{OpenAiCompletion, OpenAiConfig};
pub use retry::{CallPolicy, with_policy};
pub use tavily::TavilySearch;

/// Text-completion provider used for judgment calls: relevance scoring,
/// question generation, grading and remediation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a prompt, returning at most `max_output` tokens of text.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` describing transient or permanent failures.
    async fn complete(&self, prompt: &str, max_output: u32) -> Result<String, ProviderError>;
}

/// One result from the search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: Option<Url>,
}

/// Web search / document retrieval provider.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return up to `k` snippets for the query.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` describing transient or permanent failures.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

/// A queryable index over context chunks.
pub trait ChunkIndex: Send + Sync {
    /// The `k` chunks most relevant to the query text, best first.
    fn query(&self, text: &str, k: usize) -> Vec<ContextChunk>;
}

/// Builds a `ChunkIndex` from a chunk set.
pub trait ChunkIndexer: Send + Sync {
    fn index(&self, chunks: &[ContextChunk]) -> Box<dyn ChunkIndex>;
}

/// Keyword-overlap chunk index; embeddings are deliberately out of scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalIndexer;

impl ChunkIndexer for LexicalIndexer {
    fn index(&self, chunks: &[ContextChunk]) -> Box<dyn ChunkIndex> {
        Box::new(LexicalIndex {
            chunks: chunks.to_vec(),
        })
    }
}

struct LexicalIndex {
    chunks: Vec<ContextChunk>,
}

impl ChunkIndex for LexicalIndex {
    fn query(&self, text: &str, k: usize) -> Vec<ContextChunk> {
        let query_tokens = overlap::tokens(text);
        let mut scored: Vec<(usize, &ContextChunk)> = self
            .chunks
            .iter()
            .map(|chunk| {
                let hits = overlap::tokens(&chunk.text)
                    .iter()
                    .filter(|token| query_tokens.contains(*token))
                    .count();
                (hits, chunk)
            })
            .collect();
        // stable: ties keep original chunk order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::ContextId;

    fn chunk(text: &str) -> ContextChunk {
        ContextChunk {
            text: text.to_string(),
            origin_context_id: ContextId::new(1),
        }
    }

    #[test]
    fn lexical_index_ranks_by_overlap() {
        let chunks = vec![
            chunk("gardening tips for spring"),
            chunk("ownership moves values between bindings"),
            chunk("borrowing lets code read values without ownership"),
        ];
        let index = LexicalIndexer.index(&chunks);

        let top = index.query("explain ownership and borrowing of values", 2);
        assert_eq!(top.len(), 2);
        assert!(top[0].text.contains("borrowing"));
        assert!(top[1].text.contains("ownership moves"));
    }

    #[test]
    fn lexical_index_caps_at_k() {
        let chunks = vec![chunk("alpha"), chunk("beta")];
        let index = LexicalIndexer.index(&chunks);
        assert_eq!(index.query("anything", 5).len(), 2);
        assert_eq!(index.query("anything", 1).len(), 1);
    }
}
