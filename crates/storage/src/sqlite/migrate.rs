use sqlx::SqlitePool;

use super::SqliteInitError;

const CREATE_SESSIONS: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    current_index INTEGER NOT NULL,
    completed_indices TEXT NOT NULL,
    attempt TEXT,
    updated_at TEXT NOT NULL
);
";

const CREATE_CONTEXT_LOG: &str = "
CREATE TABLE IF NOT EXISTS context_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    context_id INTEGER NOT NULL,
    origin TEXT NOT NULL,
    content TEXT NOT NULL,
    relevance INTEGER,
    gathered_at TEXT NOT NULL
);
";

const CREATE_CONTEXT_LOG_INDEX: &str = "
CREATE INDEX IF NOT EXISTS idx_context_log_session ON context_log (session_id, id);
";

pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(CREATE_SESSIONS).execute(pool).await?;
    sqlx::query(CREATE_CONTEXT_LOG).execute(pool).await?;
    sqlx::query(CREATE_CONTEXT_LOG_INDEX).execute(pool).await?;
    Ok(())
}
