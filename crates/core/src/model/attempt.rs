use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::AttemptId;

/// The stage a checkpoint attempt is currently in.
///
/// `Passed` and `FailedExhausted` are terminal: no further automatic
/// transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Gathering,
    Validating,
    Processing,
    Questioning,
    AwaitingAnswers,
    Grading,
    Deciding,
    Remediating,
    Passed,
    FailedExhausted,
}

impl Stage {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Passed | Stage::FailedExhausted)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Gathering => "gathering",
            Stage::Validating => "validating",
            Stage::Processing => "processing",
            Stage::Questioning => "questioning",
            Stage::AwaitingAnswers => "awaiting_answers",
            Stage::Grading => "grading",
            Stage::Deciding => "deciding",
            Stage::Remediating => "remediating",
            Stage::Passed => "passed",
            Stage::FailedExhausted => "failed_exhausted",
        };
        f.write_str(name)
    }
}

/// Overall outcome of a checkpoint attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Passed,
    FailedExhausted,
}

/// Mutable bookkeeping for one checkpoint attempt.
///
/// Exclusively owned and written by the controller; everything else sees
/// read-only snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointAttemptState {
    pub attempt_id: AttemptId,
    pub stage: Stage,
    pub status: AttemptStatus,
    pub context_retry_count: u32,
    pub remediation_count: u32,
    pub average_score: Option<f64>,
    /// Set when the workflow proceeded on low-relevance context after
    /// exhausting gather retries.
    pub quality_warning: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl CheckpointAttemptState {
    #[must_use]
    pub fn new(attempt_id: AttemptId, started_at: DateTime<Utc>) -> Self {
        Self {
            attempt_id,
            stage: Stage::Init,
            status: AttemptStatus::InProgress,
            context_retry_count: 0,
            remediation_count: 0,
            average_score: None,
            quality_warning: None,
            started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn only_pass_and_exhausted_are_terminal() {
        assert!(Stage::Passed.is_terminal());
        assert!(Stage::FailedExhausted.is_terminal());
        for stage in [
            Stage::Init,
            Stage::Gathering,
            Stage::Validating,
            Stage::Processing,
            Stage::Questioning,
            Stage::AwaitingAnswers,
            Stage::Grading,
            Stage::Deciding,
            Stage::Remediating,
        ] {
            assert!(!stage.is_terminal(), "{stage} should not be terminal");
        }
    }

    #[test]
    fn fresh_attempt_starts_zeroed() {
        let state = CheckpointAttemptState::new(AttemptId::new(), fixed_now());
        assert_eq!(state.stage, Stage::Init);
        assert_eq!(state.status, AttemptStatus::InProgress);
        assert_eq!(state.context_retry_count, 0);
        assert_eq!(state.remediation_count, 0);
        assert!(state.average_score.is_none());
        assert!(state.quality_warning.is_none());
    }

    #[test]
    fn state_roundtrips_through_json() {
        let state = CheckpointAttemptState::new(AttemptId::new(), fixed_now());
        let json = serde_json::to_string(&state).unwrap();
        let back: CheckpointAttemptState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
