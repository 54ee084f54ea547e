mod attempt;
mod checkpoint;
mod context;
mod grade;
mod ids;
mod question;
mod remediation;

pub use attempt::{AttemptStatus, CheckpointAttemptState, Stage};
pub use checkpoint::{Checkpoint, CheckpointError, LearningPath, PathError};
pub use context::{ContextChunk, ContextOrigin, GatheredContext, RelevanceScore};
pub use grade::{GradeResult, average_score};
pub use ids::{AttemptId, ContextId, ParseIdError, QuestionId, SessionId};
pub use question::{LearnerAnswer, Question, QuestionError, QuestionKind};
pub use remediation::RemediationRecord;
