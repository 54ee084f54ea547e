//! Relevance validation of gathered context against checkpoint objectives.

use std::sync::Arc;

use tracing::warn;

use tutor_core::model::{Checkpoint, GatheredContext, RelevanceScore};
use tutor_core::overlap;

use crate::parse;
use crate::providers::{CallPolicy, CompletionProvider, with_policy};

const JUDGMENT_MAX_TOKENS: u32 = 200;

/// The validator's verdict on one gathered context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceJudgment {
    pub score: RelevanceScore,
    pub rationale: String,
}

/// Scores gathered context on the 1-5 relevance scale.
///
/// Validation is total: provider failures degrade to a conservative score
/// instead of surfacing, so a flaky judge never stalls the workflow.
pub struct RelevanceValidator {
    llm: Arc<dyn CompletionProvider>,
    policy: CallPolicy,
}

impl RelevanceValidator {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>, policy: CallPolicy) -> Self {
        Self { llm, policy }
    }

    /// Judge how well the context covers the checkpoint objectives.
    ///
    /// The score averages a lexical objective-coverage signal with the LLM
    /// judgment. Empty context scores the minimum outright.
    pub async fn validate(
        &self,
        checkpoint: &Checkpoint,
        context: &GatheredContext,
    ) -> RelevanceJudgment {
        if context.is_empty() {
            return RelevanceJudgment {
                score: RelevanceScore::MIN,
                rationale: "no material was gathered".into(),
            };
        }

        let ratio = overlap::overlap_ratio(&context.content, checkpoint.objectives());
        let lexical = 1.0 + ratio * 4.0;

        let (llm_score, rationale) = match self.judge(checkpoint, context).await {
            Some(judgment) => judgment,
            None => {
                warn!(topic = checkpoint.topic(), "relevance judge unavailable, using conservative score");
                (
                    2.0,
                    "judgment unavailable, scored conservatively".to_string(),
                )
            }
        };

        RelevanceJudgment {
            score: RelevanceScore::from_f64((lexical + llm_score) / 2.0),
            rationale,
        }
    }

    async fn judge(
        &self,
        checkpoint: &Checkpoint,
        context: &GatheredContext,
    ) -> Option<(f64, String)> {
        let prompt = judgment_prompt(checkpoint, context);
        let llm = Arc::clone(&self.llm);
        let response = with_policy(self.policy, || {
            let llm = Arc::clone(&llm);
            let prompt = prompt.clone();
            async move { llm.complete(&prompt, JUDGMENT_MAX_TOKENS).await }
        })
        .await
        .ok()?;

        parse::relevance(&response).map(|(score, rationale)| (f64::from(score), rationale))
    }
}

fn judgment_prompt(checkpoint: &Checkpoint, context: &GatheredContext) -> String {
    let mut prompt = format!(
        "Rate how well the study material below covers the learning objectives \
         for the topic \"{}\".\n\nObjectives:\n",
        checkpoint.topic()
    );
    for objective in checkpoint.objectives() {
        prompt.push_str("- ");
        prompt.push_str(objective);
        prompt.push('\n');
    }
    prompt.push_str("\nMaterial:\n");
    prompt.push_str(&context.content);
    prompt.push_str(
        "\n\nReply with exactly two lines:\nSCORE: <1-5>\nREASONING: <one sentence>\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tutor_core::model::{ContextId, ContextOrigin};
    use tutor_core::time::fixed_now;

    use crate::error::ProviderError;

    struct CannedJudge(Result<String, ProviderError>);

    #[async_trait]
    impl CompletionProvider for CannedJudge {
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

    fn context(content: &str) -> GatheredContext {
        GatheredContext::new(ContextId::new(1), ContextOrigin::UserNotes, content, fixed_now())
    }

    fn validator(response: Result<String, ProviderError>) -> RelevanceValidator {
        RelevanceValidator::new(Arc::new(CannedJudge(response)), CallPolicy::fast())
    }

    #[tokio::test]
    async fn empty_context_scores_minimum_without_calling_the_judge() {
        let v = validator(Err(ProviderError::Auth));
        let judgment = v.validate(&checkpoint(), &context("   ")).await;
        assert_eq!(judgment.score, RelevanceScore::MIN);
    }

    #[tokio::test]
    async fn strong_material_and_judge_agreement_scores_high() {
        let v = validator(Ok("SCORE: 5\nREASONING: covers everything".into()));
        let judgment = v
            .validate(
                &checkpoint(),
                &context(
                    "ownership moves understand borrowing rules in depth, \
                     with examples of moves and borrowing",
                ),
            )
            .await;
        assert!(judgment.score.value() >= 4);
        assert_eq!(judgment.rationale, "covers everything");
    }

    #[tokio::test]
    async fn judge_failure_degrades_to_conservative_score() {
        let v = validator(Err(ProviderError::Auth));
        let judgment = v
            .validate(&checkpoint(), &context("gardening tips for spring"))
            .await;
        // lexical signal near 1, conservative judge at 2
        assert!(judgment.score.value() <= 2);
        assert!(judgment.rationale.contains("conservatively"));
    }

    #[tokio::test]
    async fn unparseable_judge_output_counts_as_failure() {
        let v = validator(Ok("the material seems fine".into()));
        let judgment = v
            .validate(&checkpoint(), &context("unrelated text"))
            .await;
        assert!(judgment.rationale.contains("conservatively"));
    }
}
