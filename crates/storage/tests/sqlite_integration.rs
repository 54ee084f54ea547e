use std::collections::BTreeSet;

use storage::repository::{ContextAuditRepository, SessionRecord, SessionRepository};
use storage::sqlite::SqliteRepository;
use tutor_core::model::{
    AttemptId, CheckpointAttemptState, ContextId, ContextOrigin, GatheredContext, RelevanceScore,
    SessionId, Stage,
};
use tutor_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_session_roundtrip_with_attempt_state() {
    let repo = connect("memdb_session_roundtrip").await;
    let session_id = SessionId::new();

    assert!(repo.get_session(session_id).await.unwrap().is_none());

    let mut attempt = CheckpointAttemptState::new(AttemptId::new(), fixed_now());
    attempt.stage = Stage::AwaitingAnswers;
    attempt.context_retry_count = 2;
    attempt.quality_warning = Some("proceeding with low-relevance context".into());

    let record = SessionRecord {
        session_id,
        current_index: 1,
        completed_indices: [0].into_iter().collect::<BTreeSet<usize>>(),
        attempt: Some(attempt),
        updated_at: fixed_now(),
    };
    repo.upsert_session(&record).await.unwrap();

    let loaded = repo.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(loaded, record);

    // update in place
    let mut updated = record.clone();
    updated.current_index = 2;
    updated.attempt = None;
    repo.upsert_session(&updated).await.unwrap();
    let loaded = repo.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(loaded.current_index, 2);
    assert!(loaded.attempt.is_none());

    repo.delete_session(session_id).await.unwrap();
    assert!(repo.get_session(session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_context_log_is_append_only_and_ordered() {
    let repo = connect("memdb_context_log").await;
    let session_id = SessionId::new();
    let other_session = SessionId::new();

    let mut first = GatheredContext::new(
        ContextId::new(1),
        ContextOrigin::UserNotes,
        "ownership notes",
        fixed_now(),
    );
    first.relevance = Some(RelevanceScore::new(2));
    repo.append_context(session_id, &first).await.unwrap();

    let mut second = GatheredContext::new(
        ContextId::new(2),
        ContextOrigin::WebSearch,
        "borrow checker article",
        fixed_now(),
    );
    second.relevance = Some(RelevanceScore::new(5));
    repo.append_context(session_id, &second).await.unwrap();

    let unrelated = GatheredContext::new(
        ContextId::new(1),
        ContextOrigin::Mixed,
        "other learner's context",
        fixed_now(),
    );
    repo.append_context(other_session, &unrelated).await.unwrap();

    let logged = repo.list_contexts(session_id).await.unwrap();
    assert_eq!(logged, vec![first, second]);

    let other = repo.list_contexts(other_session).await.unwrap();
    assert_eq!(other.len(), 1);
    assert!(other[0].relevance.is_none());
}
