//! Deterministic learner-answer simulation for demos and end-to-end tests.
//!
//! The engine never fabricates answers on its own; this helper exists so a
//! full workflow can run without a human in the loop.

use tutor_core::model::{ContextChunk, LearnerAnswer, Question, QuestionKind};
use tutor_core::overlap;

/// How well the simulated learner has absorbed the material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedSkill {
    /// Answers objective questions correctly and quotes the most relevant
    /// chunk for open-ended ones.
    Strong,
    /// Picks a wrong option and gives vague open-ended answers.
    Weak,
}

/// Drafts one answer per question from the processed context.
#[derive(Debug, Clone, Copy)]
pub struct AnswerSimulator {
    skill: SimulatedSkill,
}

impl AnswerSimulator {
    #[must_use]
    pub fn new(skill: SimulatedSkill) -> Self {
        Self { skill }
    }

    /// One answer for each question, in question order.
    #[must_use]
    pub fn answer_all(
        &self,
        questions: &[Question],
        chunks: &[ContextChunk],
    ) -> Vec<LearnerAnswer> {
        questions
            .iter()
            .map(|question| self.answer(question, chunks))
            .collect()
    }

    #[must_use]
    pub fn answer(&self, question: &Question, chunks: &[ContextChunk]) -> LearnerAnswer {
        let text = match (self.skill, question.kind()) {
            (SimulatedSkill::Strong, QuestionKind::Objective) => question
                .correct_answer()
                .unwrap_or_default()
                .to_string(),
            (SimulatedSkill::Weak, QuestionKind::Objective) => question
                .options()
                .iter()
                .find(|option| Some(option.as_str()) != question.correct_answer())
                .cloned()
                .unwrap_or_default(),
            (SimulatedSkill::Strong, QuestionKind::OpenEnded) => {
                let texts: Vec<String> =
                    chunks.iter().map(|chunk| chunk.text.clone()).collect();
                match overlap::best_match(question.text(), &texts) {
                    Some(index) => texts[index].clone(),
                    None => format!("Going from the material: {}", question.text()),
                }
            }
            (SimulatedSkill::Weak, QuestionKind::OpenEnded) => "I am not sure.".to_string(),
        };
        LearnerAnswer::new(question.id(), text)
    }
}
