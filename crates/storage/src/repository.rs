use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use tutor_core::model::{CheckpointAttemptState, GatheredContext, SessionId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted progression for one learner session.
///
/// Holds the learning-path cursor plus the serialized attempt state of the
/// in-progress checkpoint, which is enough to resume after a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub current_index: usize,
    pub completed_indices: BTreeSet<usize>,
    pub attempt: Option<CheckpointAttemptState>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn new(session_id: SessionId, updated_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            current_index: 0,
            completed_indices: BTreeSet::new(),
            attempt: None,
            updated_at,
        }
    }
}

/// Repository contract for session progression records.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist or update a session record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Fetch a session record, `None` when the session is unknown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError>;

    /// Remove a session record; removing an unknown session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;
}

/// Append-only audit log of gathered contexts.
///
/// Contexts are never updated or deleted; each gather retry appends a new
/// entry so relevance history survives the attempt.
#[async_trait]
pub trait ContextAuditRepository: Send + Sync {
    /// Append one gathered context to the session's log.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn append_context(
        &self,
        session: SessionId,
        context: &GatheredContext,
    ) -> Result<(), StorageError>;

    /// All contexts logged for a session, in append order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_contexts(
        &self,
        session: SessionId,
    ) -> Result<Vec<GatheredContext>, StorageError>;
}

/// Bundle of repository handles used by the services layer.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub contexts: Arc<dyn ContextAuditRepository>,
}

impl Storage {
    /// Build a `Storage` backed by in-process memory, for tests and demos.
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            sessions: Arc::new(repo.clone()),
            contexts: Arc::new(repo),
        }
    }
}

#[derive(Default)]
struct InMemoryInner {
    sessions: HashMap<SessionId, SessionRecord>,
    contexts: HashMap<SessionId, Vec<GatheredContext>>,
}

/// In-process repository used by tests and offline demos.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<Mutex<InMemoryInner>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryInner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Connection("in-memory lock poisoned".into()))
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn upsert_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.lock()?
            .sessions
            .insert(record.session_id, record.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        self.lock()?.sessions.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ContextAuditRepository for InMemoryRepository {
    async fn append_context(
        &self,
        session: SessionId,
        context: &GatheredContext,
    ) -> Result<(), StorageError> {
        self.lock()?
            .contexts
            .entry(session)
            .or_default()
            .push(context.clone());
        Ok(())
    }

    async fn list_contexts(
        &self,
        session: SessionId,
    ) -> Result<Vec<GatheredContext>, StorageError> {
        Ok(self.lock()?.contexts.get(&session).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::{AttemptId, ContextId, ContextOrigin};
    use tutor_core::time::fixed_now;

    #[tokio::test]
    async fn in_memory_session_roundtrip() {
        let repo = InMemoryRepository::new();
        let id = SessionId::new();

        assert!(repo.get_session(id).await.unwrap().is_none());

        let mut record = SessionRecord::new(id, fixed_now());
        record.current_index = 2;
        record.completed_indices = [0, 1].into_iter().collect();
        record.attempt = Some(CheckpointAttemptState::new(AttemptId::new(), fixed_now()));
        repo.upsert_session(&record).await.unwrap();

        let loaded = repo.get_session(id).await.unwrap().unwrap();
        assert_eq!(loaded, record);

        repo.delete_session(id).await.unwrap();
        assert!(repo.get_session(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn context_log_preserves_append_order() {
        let repo = InMemoryRepository::new();
        let session = SessionId::new();

        for i in 1..=3 {
            let ctx = GatheredContext::new(
                ContextId::new(i),
                ContextOrigin::WebSearch,
                format!("context {i}"),
                fixed_now(),
            );
            repo.append_context(session, &ctx).await.unwrap();
        }

        let logged = repo.list_contexts(session).await.unwrap();
        assert_eq!(logged.len(), 3);
        assert_eq!(logged[0].id, ContextId::new(1));
        assert_eq!(logged[2].id, ContextId::new(3));
    }
}
