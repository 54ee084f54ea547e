//! Learning-path progression across checkpoints.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use tracing::info;

use storage::{SessionRecord, Storage};
use tutor_core::Clock;
use tutor_core::model::{Checkpoint, LearningPath, SessionId};

use crate::error::EngineError;

/// Read-only view of a session's position on its learning path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathProgress {
    pub session_id: SessionId,
    pub current_index: usize,
    pub completed: BTreeSet<usize>,
    pub finished: bool,
    pub current_topic: Option<String>,
}

/// Walks an ordered checkpoint list, advancing only on a recorded PASS or an
/// explicit operator override, persisting after every move.
pub struct LearningPathService {
    storage: Storage,
    clock: Clock,
    paths: Mutex<HashMap<SessionId, LearningPath>>,
}

impl LearningPathService {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock) -> Self {
        Self {
            storage,
            clock,
            paths: Mutex::new(HashMap::new()),
        }
    }

    /// Open a session over the given checkpoints, resuming persisted
    /// progression when a record exists.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the checkpoint list is empty, a persisted
    /// record does not fit the list, or storage fails.
    pub async fn open(
        &self,
        session: SessionId,
        checkpoints: Vec<Checkpoint>,
    ) -> Result<PathProgress, EngineError> {
        let path = match self.storage.sessions.get_session(session).await? {
            Some(record) => LearningPath::from_persisted(
                checkpoints,
                record.current_index,
                record.completed_indices,
            )?,
            None => {
                let path = LearningPath::new(checkpoints)?;
                self.persist(session, &path, true).await?;
                path
            }
        };

        let progress = progress_of(session, &path);
        self.lock()?.insert(session, path);
        info!(session = %session, index = progress.current_index, "session opened");
        Ok(progress)
    }

    /// The checkpoint the session should attempt next, `None` once finished.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownSession` when the session is not open.
    pub fn current_checkpoint(&self, session: SessionId) -> Result<Option<Checkpoint>, EngineError> {
        let paths = self.lock()?;
        let path = paths.get(&session).ok_or(EngineError::UnknownSession)?;
        Ok(path.current().cloned())
    }

    /// Position of an open session.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownSession` when the session is not open.
    pub fn progress(&self, session: SessionId) -> Result<PathProgress, EngineError> {
        let paths = self.lock()?;
        let path = paths.get(&session).ok_or(EngineError::UnknownSession)?;
        Ok(progress_of(session, path))
    }

    /// Record a terminal PASS for the active checkpoint and advance.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::PathFinished` when no checkpoint is active, or
    /// `EngineError::UnknownSession` / storage errors.
    pub async fn record_pass(&self, session: SessionId) -> Result<PathProgress, EngineError> {
        self.advance(session, false).await
    }

    /// Operator override: skip the active checkpoint without completing it.
    ///
    /// # Errors
    ///
    /// Same as `record_pass`.
    pub async fn force_advance(&self, session: SessionId) -> Result<PathProgress, EngineError> {
        self.advance(session, true).await
    }

    async fn advance(&self, session: SessionId, forced: bool) -> Result<PathProgress, EngineError> {
        let path = {
            let mut paths = self.lock()?;
            let path = paths.get_mut(&session).ok_or(EngineError::UnknownSession)?;
            if path.is_finished() {
                return Err(EngineError::PathFinished);
            }
            if forced {
                path.force_advance();
            } else {
                path.advance_passed();
            }
            path.clone()
        };

        self.persist(session, &path, true).await?;
        info!(session = %session, index = path.current_index(), forced, "path advanced");
        Ok(progress_of(session, &path))
    }

    async fn persist(
        &self,
        session: SessionId,
        path: &LearningPath,
        clear_attempt: bool,
    ) -> Result<(), EngineError> {
        let mut record = self
            .storage
            .sessions
            .get_session(session)
            .await?
            .unwrap_or_else(|| SessionRecord::new(session, self.clock.now()));
        record.current_index = path.current_index();
        record.completed_indices = path.completed().clone();
        if clear_attempt {
            record.attempt = None;
        }
        record.updated_at = self.clock.now();
        self.storage.sessions.upsert_session(&record).await?;
        Ok(())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, LearningPath>>, EngineError> {
        self.paths.lock().map_err(|_| EngineError::Poisoned)
    }
}

fn progress_of(session: SessionId, path: &LearningPath) -> PathProgress {
    PathProgress {
        session_id: session,
        current_index: path.current_index(),
        completed: path.completed().clone(),
        finished: path.is_finished(),
        current_topic: path.current().map(|cp| cp.topic().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::time::fixed_clock;

    fn checkpoints() -> Vec<Checkpoint> {
        ["Ownership", "Borrowing"]
            .iter()
            .map(|topic| Checkpoint::new(*topic, vec!["Understand the basics".into()]).unwrap())
            .collect()
    }

    fn service() -> LearningPathService {
        LearningPathService::new(Storage::in_memory(), fixed_clock())
    }

    #[tokio::test]
    async fn pass_advances_and_persists() {
        let svc = service();
        let session = SessionId::new();

        let progress = svc.open(session, checkpoints()).await.unwrap();
        assert_eq!(progress.current_index, 0);
        assert_eq!(progress.current_topic.as_deref(), Some("Ownership"));

        let progress = svc.record_pass(session).await.unwrap();
        assert_eq!(progress.current_index, 1);
        assert!(progress.completed.contains(&0));

        let record = svc
            .storage
            .sessions
            .get_session(session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.current_index, 1);
    }

    #[tokio::test]
    async fn force_advance_skips_without_completion() {
        let svc = service();
        let session = SessionId::new();
        svc.open(session, checkpoints()).await.unwrap();

        let progress = svc.force_advance(session).await.unwrap();
        assert_eq!(progress.current_index, 1);
        assert!(!progress.completed.contains(&0));
    }

    #[tokio::test]
    async fn finished_paths_refuse_to_advance() {
        let svc = service();
        let session = SessionId::new();
        svc.open(session, checkpoints()).await.unwrap();

        svc.record_pass(session).await.unwrap();
        let progress = svc.record_pass(session).await.unwrap();
        assert!(progress.finished);
        assert!(svc.current_checkpoint(session).unwrap().is_none());

        assert!(matches!(
            svc.record_pass(session).await,
            Err(EngineError::PathFinished)
        ));
    }

    #[tokio::test]
    async fn reopening_resumes_persisted_position() {
        let storage = Storage::in_memory();
        let session = SessionId::new();

        let svc = LearningPathService::new(storage.clone(), fixed_clock());
        svc.open(session, checkpoints()).await.unwrap();
        svc.record_pass(session).await.unwrap();

        let fresh = LearningPathService::new(storage, fixed_clock());
        let progress = fresh.open(session, checkpoints()).await.unwrap();
        assert_eq!(progress.current_index, 1);
        assert!(progress.completed.contains(&0));
    }

    #[tokio::test]
    async fn unknown_sessions_are_rejected() {
        let svc = service();
        assert!(matches!(
            svc.progress(SessionId::new()),
            Err(EngineError::UnknownSession)
        ));
    }
}
