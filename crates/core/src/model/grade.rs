use serde::{Deserialize, Serialize};

use crate::model::QuestionId;

/// The graded outcome for a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    question_id: QuestionId,
    score: f64,
    feedback: String,
    concept_tag: String,
}

impl GradeResult {
    /// Build a grade, clamping the score into `[0, 100]`.
    #[must_use]
    pub fn new(
        question_id: QuestionId,
        score: f64,
        feedback: impl Into<String>,
        concept_tag: impl Into<String>,
    ) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 100.0)
        };
        Self {
            question_id,
            score,
            feedback: feedback.into(),
            concept_tag: concept_tag.into(),
        }
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    #[must_use]
    pub fn concept_tag(&self) -> &str {
        &self.concept_tag
    }

    /// A result is weak when it scores below the checkpoint's mastery
    /// threshold scaled to the 0-100 range.
    #[must_use]
    pub fn is_weak(&self, success_threshold: f64) -> bool {
        self.score < success_threshold * 100.0
    }
}

/// Arithmetic mean of per-question scores; `0.0` for an empty batch.
#[must_use]
pub fn average_score(results: &[GradeResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(GradeResult::score).sum::<f64>() / results.len() as f64
}
