//! Grading learner answers against questions and the gathered material.

use std::sync::Arc;

use tracing::warn;

use tutor_core::model::{Checkpoint, ContextChunk, GradeResult, LearnerAnswer, Question};
use tutor_core::overlap;

use crate::parse;
use crate::providers::{CallPolicy, CompletionProvider, with_policy};

const GRADING_MAX_TOKENS: u32 = 300;
const PROMPT_REFERENCE_CHARS: usize = 1200;

/// Grades one answer per question on the 0-100 scale.
///
/// Grading is total: per-question provider failures produce a documented
/// conservative score instead of failing the batch.
pub struct AnswerGrader {
    llm: Arc<dyn CompletionProvider>,
    policy: CallPolicy,
}

impl AnswerGrader {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>, policy: CallPolicy) -> Self {
        Self { llm, policy }
    }

    /// Grade the answer batch against the processed reference material.
    /// Callers guarantee one answer per question; pairing is by question id.
    pub async fn grade(
        &self,
        checkpoint: &Checkpoint,
        questions: &[Question],
        answers: &[LearnerAnswer],
        chunks: &[ContextChunk],
    ) -> Vec<GradeResult> {
        let reference = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut results = Vec::with_capacity(questions.len());
        for question in questions {
            let answer = answers.iter().find(|a| a.question_id == question.id());
            results.push(self.grade_one(checkpoint, question, answer, &reference).await);
        }
        results
    }

    async fn grade_one(
        &self,
        checkpoint: &Checkpoint,
        question: &Question,
        answer: Option<&LearnerAnswer>,
        reference: &str,
    ) -> GradeResult {
        let concept = concept_tag(checkpoint, question);

        let Some(answer) = answer.filter(|a| !a.is_blank()) else {
            return GradeResult::new(
                question.id(),
                0.0,
                "no answer was given",
                concept,
            );
        };

        // Objective questions are keyed; no judgment call needed.
        if let Some(correct) = question.matches_correct(&answer.text) {
            let (score, feedback) = if correct {
                (100.0, "correct".to_string())
            } else {
                (
                    0.0,
                    format!(
                        "incorrect; the expected answer was \"{}\"",
                        question.correct_answer().unwrap_or_default()
                    ),
                )
            };
            return GradeResult::new(question.id(), score, feedback, concept);
        }

        // Fraction of the answer's content words grounded in the reference
        // material. Absent material, the judge stands alone.
        let grounding = if reference.trim().is_empty() {
            None
        } else {
            Some(
                overlap::overlap_ratio(reference, std::slice::from_ref(&answer.text)) * 100.0,
            )
        };

        match self.judge(checkpoint, question, answer, reference).await {
            Some((llm_score, feedback)) => {
                let score = match grounding {
                    Some(grounded) => (grounded + llm_score) / 2.0,
                    None => llm_score,
                };
                GradeResult::new(question.id(), score, feedback, concept)
            }
            None => {
                warn!(question = %question.id(), "grading judge unavailable, using conservative score");
                GradeResult::new(
                    question.id(),
                    50.0,
                    "automatic grading was unavailable; scored conservatively",
                    concept,
                )
            }
        }
    }

    async fn judge(
        &self,
        checkpoint: &Checkpoint,
        question: &Question,
        answer: &LearnerAnswer,
        reference: &str,
    ) -> Option<(f64, String)> {
        let prompt = grading_prompt(checkpoint, question, answer, reference);
        let llm = Arc::clone(&self.llm);
        let response = with_policy(self.policy, || {
            let llm = Arc::clone(&llm);
            let prompt = prompt.clone();
            async move { llm.complete(&prompt, GRADING_MAX_TOKENS).await }
        })
        .await
        .ok()?;

        parse::grade(&response)
    }
}

/// The objective text a question targets, used to tag weak results.
fn concept_tag(checkpoint: &Checkpoint, question: &Question) -> String {
    checkpoint
        .objectives()
        .get(question.objective_ref())
        .cloned()
        .unwrap_or_else(|| checkpoint.topic().to_string())
}

fn grading_prompt(
    checkpoint: &Checkpoint,
    question: &Question,
    answer: &LearnerAnswer,
    reference: &str,
) -> String {
    let excerpt: String = reference.chars().take(PROMPT_REFERENCE_CHARS).collect();
    format!(
        "Grade this answer for the topic \"{}\".\n\nQuestion: {}\nTargeted \
         objective: {}\nAnswer: {}\n\nReference material:\n{}\n\nReply with a \
         JSON object: {{\"score\": <0.0-1.0>, \"feedback\": \"<one sentence>\"}}\n",
        checkpoint.topic(),
        question.text(),
        concept_tag(checkpoint, question),
        answer.text,
        excerpt,
    )
}
