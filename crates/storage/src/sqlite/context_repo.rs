use async_trait::async_trait;
use sqlx::Row;

use tutor_core::model::{ContextId, GatheredContext, RelevanceScore, SessionId};

use super::SqliteRepository;
use super::mapping;
use crate::repository::{ContextAuditRepository, StorageError};

fn map_sqlx(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl ContextAuditRepository for SqliteRepository {
    async fn append_context(
        &self,
        session: SessionId,
        context: &GatheredContext,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO context_log (session_id, context_id, origin, content, relevance, gathered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(mapping::session_id_to_string(session))
        .bind(context.id.value() as i64)
        .bind(context.origin.as_str())
        .bind(&context.content)
        .bind(context.relevance.map(|score| i64::from(score.value())))
        .bind(mapping::timestamp_to_string(context.gathered_at))
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn list_contexts(
        &self,
        session: SessionId,
    ) -> Result<Vec<GatheredContext>, StorageError> {
        let rows = sqlx::query(
            "SELECT context_id, origin, content, relevance, gathered_at
             FROM context_log WHERE session_id = ?1 ORDER BY id ASC",
        )
        .bind(mapping::session_id_to_string(session))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        let mut contexts = Vec::with_capacity(rows.len());
        for row in rows {
            let context_id: i64 = row.get("context_id");
            let origin: String = row.get("origin");
            let content: String = row.get("content");
            let relevance: Option<i64> = row.get("relevance");
            let gathered_at: String = row.get("gathered_at");

            let context_id = u64::try_from(context_id).map_err(|_| {
                StorageError::Serialization(format!("bad context id: {context_id}"))
            })?;
            let relevance = relevance
                .map(|value| {
                    u8::try_from(value).map_err(|_| {
                        StorageError::Serialization(format!("bad relevance: {value}"))
                    })
                })
                .transpose()?
                .map(RelevanceScore::new);

            let mut context = GatheredContext::new(
                ContextId::new(context_id),
                mapping::origin_from_str(&origin)?,
                content,
                mapping::timestamp_from_string(&gathered_at)?,
            );
            context.relevance = relevance;
            contexts.push(context);
        }

        Ok(contexts)
    }
}
