//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use tutor_core::chunker::ChunkConfigError;
use tutor_core::model::{CheckpointError, PathError};

/// Errors emitted by external providers.
///
/// Transient variants are retried with backoff by the call policy; permanent
/// variants surface immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,

    #[error("provider rate limited the request")]
    RateLimited,

    #[error("provider temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("provider authentication failed")]
    Auth,

    #[error("provider rejected the request: {0}")]
    Rejected(String),

    #[error("provider is not configured")]
    NotConfigured,

    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether a retry with backoff can reasonably succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::RateLimited | ProviderError::Unavailable(_)
        )
    }
}

/// Errors emitted by the checkpoint engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("unknown attempt id")]
    UnknownAttempt,

    #[error("unknown session id")]
    UnknownSession,

    #[error("missing answers for {count} question(s)")]
    MissingAnswers { count: usize },

    #[error("answer references a question outside the current set")]
    UnknownQuestion,

    #[error("attempt registry lock poisoned")]
    Poisoned,

    #[error("learning path is finished")]
    PathFinished,

    #[error("provider failure: {0}")]
    Provider(ProviderError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    ChunkConfig(#[from] ChunkConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    SqliteInit(#[from] SqliteInitError),
}
