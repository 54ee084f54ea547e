//! Deterministic fixed-size text splitting with overlap.
//!
//! Chunking is pure and configuration-driven: the same input and config
//! always yield the same chunks. A bad config is a constructor error, not a
//! workflow condition.

use thiserror::Error;

use crate::model::{ContextChunk, GatheredContext};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChunkConfigError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Chunk size and overlap, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    pub const DEFAULT_OVERLAP: usize = 200;

    /// Validate and build a config.
    ///
    /// # Errors
    ///
    /// Returns `ChunkConfigError` when the chunk size is zero or the overlap
    /// is not strictly smaller than the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkConfigError> {
        if chunk_size == 0 {
            return Err(ChunkConfigError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkConfigError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            overlap: Self::DEFAULT_OVERLAP,
        }
    }
}

/// Split text into overlapping windows of `chunk_size` characters.
///
/// Windows step by `chunk_size - overlap`; whitespace-only windows are
/// dropped. Operates on characters so multi-byte input never splits inside a
/// code point.
#[must_use]
pub fn split(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = config.chunk_size - config.overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Chunk one gathered context, tagging every chunk with its origin id.
#[must_use]
pub fn chunk_context(context: &GatheredContext, config: &ChunkConfig) -> Vec<ContextChunk> {
    split(&context.content, config)
        .into_iter()
        .map(|text| ContextChunk {
            text,
            origin_context_id: context.id,
        })
        .collect()
}
