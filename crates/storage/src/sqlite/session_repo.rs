use async_trait::async_trait;
use sqlx::Row;

use tutor_core::model::SessionId;

use super::SqliteRepository;
use super::mapping;
use crate::repository::{SessionRecord, SessionRepository, StorageError};

fn map_sqlx(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn upsert_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let completed = mapping::completed_to_json(&record.completed_indices)?;
        let attempt = mapping::attempt_to_json(record.attempt.as_ref())?;

        sqlx::query(
            "INSERT INTO sessions (session_id, current_index, completed_indices, attempt, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                 current_index = excluded.current_index,
                 completed_indices = excluded.completed_indices,
                 attempt = excluded.attempt,
                 updated_at = excluded.updated_at",
        )
        .bind(mapping::session_id_to_string(record.session_id))
        .bind(record.current_index as i64)
        .bind(completed)
        .bind(attempt)
        .bind(mapping::timestamp_to_string(record.updated_at))
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT session_id, current_index, completed_indices, attempt, updated_at
             FROM sessions WHERE session_id = ?1",
        )
        .bind(mapping::session_id_to_string(id))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let session_id: String = row.get("session_id");
        let current_index: i64 = row.get("current_index");
        let completed: String = row.get("completed_indices");
        let attempt: Option<String> = row.get("attempt");
        let updated_at: String = row.get("updated_at");

        Ok(Some(SessionRecord {
            session_id: mapping::session_id_from_string(&session_id)?,
            current_index: usize::try_from(current_index).map_err(|_| {
                StorageError::Serialization(format!("bad current index: {current_index}"))
            })?,
            completed_indices: mapping::completed_from_json(&completed)?,
            attempt: mapping::attempt_from_json(attempt.as_deref())?,
            updated_at: mapping::timestamp_from_string(&updated_at)?,
        }))
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(mapping::session_id_to_string(id))
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
