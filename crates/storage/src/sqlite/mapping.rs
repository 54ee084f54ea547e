//! Conversions between domain values and their persisted SQLite shapes.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use tutor_core::model::{CheckpointAttemptState, ContextOrigin, SessionId};

use crate::repository::StorageError;

pub(crate) fn session_id_to_string(id: SessionId) -> String {
    id.value().to_string()
}

pub(crate) fn session_id_from_string(raw: &str) -> Result<SessionId, StorageError> {
    raw.parse::<SessionId>()
        .map_err(|_| StorageError::Serialization(format!("bad session id: {raw}")))
}

pub(crate) fn completed_to_json(completed: &BTreeSet<usize>) -> Result<String, StorageError> {
    serde_json::to_string(completed).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn completed_from_json(raw: &str) -> Result<BTreeSet<usize>, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn attempt_to_json(
    attempt: Option<&CheckpointAttemptState>,
) -> Result<Option<String>, StorageError> {
    attempt
        .map(|state| {
            serde_json::to_string(state).map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
}

pub(crate) fn attempt_from_json(
    raw: Option<&str>,
) -> Result<Option<CheckpointAttemptState>, StorageError> {
    raw.map(|json| {
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))
    })
    .transpose()
}

pub(crate) fn origin_from_str(raw: &str) -> Result<ContextOrigin, StorageError> {
    ContextOrigin::from_str_opt(raw)
        .ok_or_else(|| StorageError::Serialization(format!("bad context origin: {raw}")))
}

pub(crate) fn timestamp_to_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub(crate) fn timestamp_from_string(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp {raw}: {e}")))
}
