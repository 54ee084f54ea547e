use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("objective question needs 3-4 distinct options, got {count}")]
    BadOptionCount { count: usize },

    #[error("correct answer is not one of the options")]
    CorrectAnswerMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Objective,
    OpenEnded,
}

/// A generated assessment question.
///
/// Questions are regenerated wholesale on each assessment cycle, never
/// mutated; every instance carries a fresh id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    kind: QuestionKind,
    options: Vec<String>,
    correct_answer: Option<String>,
    /// Index of the checkpoint objective this question targets.
    objective_ref: usize,
}

impl Question {
    /// Create an open-ended question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` when the text is blank.
    pub fn open_ended(
        text: impl Into<String>,
        objective_ref: usize,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        Ok(Self {
            id: QuestionId::new(),
            text,
            kind: QuestionKind::OpenEnded,
            options: Vec::new(),
            correct_answer: None,
            objective_ref,
        })
    }

    /// Create an objective (multiple-choice) question.
    ///
    /// # Errors
    ///
    /// Returns a `QuestionError` when the text is blank, the option count is
    /// not 3-4 after deduplication, or the correct answer is not among the
    /// options.
    pub fn objective(
        text: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
        objective_ref: usize,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let mut distinct: Vec<String> = Vec::new();
        for option in options {
            let option = option.trim().to_string();
            if !option.is_empty() && !distinct.iter().any(|o| o == &option) {
                distinct.push(option);
            }
        }
        if !(3..=4).contains(&distinct.len()) {
            return Err(QuestionError::BadOptionCount {
                count: distinct.len(),
            });
        }

        let correct_answer = correct_answer.into().trim().to_string();
        if !distinct.iter().any(|o| o == &correct_answer) {
            return Err(QuestionError::CorrectAnswerMissing);
        }

        Ok(Self {
            id: QuestionId::new(),
            text,
            kind: QuestionKind::Objective,
            options: distinct,
            correct_answer: Some(correct_answer),
            objective_ref,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    /// Answer options; empty for open-ended questions.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> Option<&str> {
        self.correct_answer.as_deref()
    }

    #[must_use]
    pub fn objective_ref(&self) -> usize {
        self.objective_ref
    }

    /// For objective questions, check a learner answer against the key.
    ///
    /// Accepts either the full option text or the option letter (`A`..`D`),
    /// case-insensitively. Returns `None` for open-ended questions.
    #[must_use]
    pub fn matches_correct(&self, answer: &str) -> Option<bool> {
        let correct = self.correct_answer.as_deref()?;
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case(correct) {
            return Some(true);
        }

        // Single-letter answers refer to the option position.
        let mut chars = answer.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            let index = (letter.to_ascii_uppercase() as i32) - ('A' as i32);
            if (0..self.options.len() as i32).contains(&index) {
                return Some(self.options[index as usize] == correct);
            }
        }
        Some(false)
    }
}

/// A learner-supplied answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerAnswer {
    pub question_id: QuestionId,
    pub text: String,
}

impl LearnerAnswer {
    #[must_use]
    pub fn new(question_id: QuestionId, text: impl Into<String>) -> Self {
        Self {
            question_id,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq() -> Question {
        Question::objective(
            "Which keyword moves ownership?",
            vec!["let".into(), "move".into(), "borrow".into(), "clone".into()],
            "move",
            0,
        )
        .unwrap()
    }

    #[test]
    fn objective_requires_three_to_four_distinct_options() {
        let err = Question::objective(
            "Pick one",
            vec!["a".into(), "a".into(), "b".into()],
            "a",
            0,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::BadOptionCount { count: 2 });

        let err = Question::objective(
            "Pick one",
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            "a",
            0,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::BadOptionCount { count: 5 });
    }

    #[test]
    fn objective_requires_correct_answer_among_options() {
        let err = Question::objective(
            "Pick one",
            vec!["a".into(), "b".into(), "c".into()],
            "z",
            0,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::CorrectAnswerMissing);
    }

    #[test]
    fn matches_correct_accepts_text_or_letter() {
        let q = mcq();
        assert_eq!(q.matches_correct("move"), Some(true));
        assert_eq!(q.matches_correct("MOVE"), Some(true));
        assert_eq!(q.matches_correct("b"), Some(true));
        assert_eq!(q.matches_correct("B"), Some(true));
        assert_eq!(q.matches_correct("A"), Some(false));
        assert_eq!(q.matches_correct("let"), Some(false));
        assert_eq!(q.matches_correct("Z"), Some(false));
    }

    #[test]
    fn open_ended_has_no_key() {
        let q = Question::open_ended("Explain borrowing.", 1).unwrap();
        assert_eq!(q.kind(), QuestionKind::OpenEnded);
        assert!(q.options().is_empty());
        assert!(q.matches_correct("anything").is_none());
    }

    #[test]
    fn blank_answer_detection() {
        let q = mcq();
        assert!(LearnerAnswer::new(q.id(), "  \n").is_blank());
        assert!(!LearnerAnswer::new(q.id(), "move").is_blank());
    }
}
