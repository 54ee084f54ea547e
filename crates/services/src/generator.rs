//! Assessment question generation from processed context.

use std::sync::Arc;

use tracing::{debug, warn};

use tutor_core::model::{Checkpoint, ContextChunk, Question, QuestionKind};

use crate::parse;
use crate::providers::{CallPolicy, ChunkIndexer, CompletionProvider, with_policy};

const GENERATION_MAX_TOKENS: u32 = 900;
const PROMPT_CHUNKS: usize = 6;

/// Default question count per assessment cycle: one objective question plus
/// three open-ended ones.
pub const DEFAULT_QUESTION_COUNT: usize = 4;

/// Generates assessment questions, falling back to deterministic
/// objective-derived questions when the provider fails or underdelivers.
///
/// Every call mints fresh question ids, so two cycles never share one.
pub struct AssessmentGenerator {
    llm: Arc<dyn CompletionProvider>,
    indexer: Box<dyn ChunkIndexer>,
    policy: CallPolicy,
    question_count: usize,
}

impl AssessmentGenerator {
    #[must_use]
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        indexer: Box<dyn ChunkIndexer>,
        policy: CallPolicy,
        question_count: usize,
    ) -> Self {
        Self {
            llm,
            indexer,
            policy,
            question_count: question_count.max(1),
        }
    }

    /// Generate at least `question_count` questions with at least one
    /// objective question among them. Total: never fails.
    pub async fn generate(&self, checkpoint: &Checkpoint, chunks: &[ContextChunk]) -> Vec<Question> {
        let mut questions = match self.generate_via_llm(checkpoint, chunks).await {
            Some(parsed) if !parsed.is_empty() => parsed,
            _ => {
                warn!(
                    topic = checkpoint.topic(),
                    "question generation failed, using objective-derived fallback"
                );
                Vec::new()
            }
        };

        let needs_mcq = !questions
            .iter()
            .any(|q| q.kind() == QuestionKind::Objective);
        if needs_mcq || questions.len() < self.question_count {
            let fallback = fallback_questions(checkpoint, self.question_count);
            for question in fallback {
                let have_mcq = questions
                    .iter()
                    .any(|q| q.kind() == QuestionKind::Objective);
                if questions.len() >= self.question_count && have_mcq {
                    break;
                }
                if question.kind() == QuestionKind::Objective && have_mcq {
                    continue;
                }
                questions.push(question);
            }
        }

        debug!(
            topic = checkpoint.topic(),
            count = questions.len(),
            "assessment questions ready"
        );
        questions
    }

    async fn generate_via_llm(
        &self,
        checkpoint: &Checkpoint,
        chunks: &[ContextChunk],
    ) -> Option<Vec<Question>> {
        let index = self.indexer.index(chunks);
        let mut query = checkpoint.topic().to_string();
        for objective in checkpoint.objectives() {
            query.push(' ');
            query.push_str(objective);
        }
        let selected = index.query(&query, PROMPT_CHUNKS);
        let prompt = generation_prompt(checkpoint, &selected, self.question_count);

        let llm = Arc::clone(&self.llm);
        let response = with_policy(self.policy, || {
            let llm = Arc::clone(&llm);
            let prompt = prompt.clone();
            async move { llm.complete(&prompt, GENERATION_MAX_TOKENS).await }
        })
        .await
        .ok()?;

        Some(parse::questions(&response, checkpoint.objectives()))
    }
}

fn generation_prompt(checkpoint: &Checkpoint, chunks: &[ContextChunk], count: usize) -> String {
    let mut prompt = format!(
        "Write {count} assessment questions for the topic \"{}\". The first \
         should be multiple choice, the rest open-ended.\n\nObjectives:\n",
        checkpoint.topic()
    );
    for objective in checkpoint.objectives() {
        prompt.push_str("- ");
        prompt.push_str(objective);
        prompt.push('\n');
    }
    prompt.push_str("\nStudy material:\n");
    for chunk in chunks {
        prompt.push_str(&chunk.text);
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "Format each question as:\n\
         QUESTION <n> (MCQ|OPEN)\n\
         <question text>\n\
         For MCQ add options A) .. D) and a final line CORRECT: <letter>\n",
    );
    prompt
}

/// Deterministic questions derived from the checkpoint objectives: one
/// well-formed objective question, then open-ended questions cycling through
/// the objectives.
#[must_use]
pub fn fallback_questions(checkpoint: &Checkpoint, count: usize) -> Vec<Question> {
    let objectives = checkpoint.objectives();
    let mut questions = Vec::new();

    let correct = objectives[0].clone();
    let options = vec![
        correct.clone(),
        "An unrelated historical overview".to_string(),
        "A summary of marketing terminology".to_string(),
        "A list of random trivia".to_string(),
    ];
    if let Ok(mcq) = Question::objective(
        format!(
            "Which of the following is a learning objective of \"{}\"?",
            checkpoint.topic()
        ),
        options,
        correct,
        0,
    ) {
        questions.push(mcq);
    }

    let mut objective_index = 0;
    while questions.len() < count.max(1) {
        let objective = &objectives[objective_index % objectives.len()];
        if let Ok(open) = Question::open_ended(
            format!("In your own words: {objective}."),
            objective_index % objectives.len(),
        ) {
            questions.push(open);
        }
        objective_index += 1;
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::ProviderError;
    use crate::providers::LexicalIndexer;

    struct CannedLlm(Result<String, ProviderError>);

    #[async_trait]
    impl CompletionProvider for CannedLlm {
        async fn complete(&self, _prompt: &str, _max: u32) -> Result<String, ProviderError> {
            self.0.clone()
        }
    }

    fn checkpoint() -> Checkpoint {
        Checkpoint::new(
            "Rust ownership",
            vec![
                "Understand ownership moves".into(),
                "Understand borrowing rules".into(),
            ],
        )
        .unwrap()
    }

    fn generator(response: Result<String, ProviderError>) -> AssessmentGenerator {
        AssessmentGenerator::new(
            Arc::new(CannedLlm(response)),
            Box::new(LexicalIndexer),
            CallPolicy::fast(),
            DEFAULT_QUESTION_COUNT,
        )
    }

    #[tokio::test]
    async fn provider_failure_yields_full_fallback_set() {
        let g = generator(Err(ProviderError::Auth));
        let questions = g.generate(&checkpoint(), &[]).await;

        assert_eq!(questions.len(), DEFAULT_QUESTION_COUNT);
        assert_eq!(
            questions
                .iter()
                .filter(|q| q.kind() == QuestionKind::Objective)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn underdelivering_provider_is_topped_up() {
        let g = generator(Ok("\
QUESTION 1 (OPEN)
Explain ownership moves."
            .into()));
        let questions = g.generate(&checkpoint(), &[]).await;

        assert!(questions.len() >= DEFAULT_QUESTION_COUNT);
        assert!(questions.iter().any(|q| q.kind() == QuestionKind::Objective));
        assert_eq!(questions[0].text(), "Explain ownership moves.");
    }

    #[tokio::test]
    async fn well_formed_output_is_used_directly() {
        let g = generator(Ok("\
QUESTION 1 (MCQ)
Which keyword moves ownership?
A) let
B) move
C) borrow
CORRECT: B

QUESTION 2 (OPEN)
Explain ownership moves.

QUESTION 3 (OPEN)
Explain borrowing rules.

QUESTION 4 (OPEN)
When does a borrow end?"
            .into()));
        let questions = g.generate(&checkpoint(), &[]).await;

        assert_eq!(questions.len(), 4);
        assert_eq!(questions[0].kind(), QuestionKind::Objective);
    }

    #[tokio::test]
    async fn consecutive_cycles_never_share_question_ids() {
        let g = generator(Err(ProviderError::Auth));
        let first = g.generate(&checkpoint(), &[]).await;
        let second = g.generate(&checkpoint(), &[]).await;

        for q in &first {
            assert!(second.iter().all(|other| other.id() != q.id()));
        }
    }

    #[test]
    fn fallback_always_has_one_mcq_and_enough_questions() {
        let questions = fallback_questions(&checkpoint(), 6);
        assert_eq!(questions.len(), 6);
        assert_eq!(
            questions
                .iter()
                .filter(|q| q.kind() == QuestionKind::Objective)
                .count(),
            1
        );
    }
}
