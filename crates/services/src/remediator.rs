//! Remediation: one plain-language explanation covering every weak concept.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use tutor_core::model::{Checkpoint, GradeResult, RemediationRecord};

use crate::providers::{CallPolicy, CompletionProvider, with_policy};

const REMEDIATION_MAX_TOKENS: u32 = 700;

/// Produces a single remediation explanation for all weak concepts at once.
///
/// Total: a provider failure degrades to a static explanation that still
/// names every weak concept.
pub struct Remediator {
    llm: Arc<dyn CompletionProvider>,
    policy: CallPolicy,
}

impl Remediator {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>, policy: CallPolicy) -> Self {
        Self { llm, policy }
    }

    /// Explain the weak concepts behind the sub-threshold results.
    pub async fn remediate(
        &self,
        checkpoint: &Checkpoint,
        weak_results: &[GradeResult],
        attempt_number: u32,
    ) -> RemediationRecord {
        let concept_tags: BTreeSet<String> = weak_results
            .iter()
            .map(|result| result.concept_tag().to_string())
            .collect();

        let explanation = match self.explain(checkpoint, &concept_tags).await {
            Some(text) => text,
            None => {
                warn!(
                    topic = checkpoint.topic(),
                    "remediation provider unavailable, using static explanation"
                );
                static_explanation(checkpoint, &concept_tags)
            }
        };

        RemediationRecord {
            concept_tags,
            explanation,
            attempt_number,
        }
    }

    async fn explain(
        &self,
        checkpoint: &Checkpoint,
        concepts: &BTreeSet<String>,
    ) -> Option<String> {
        let prompt = remediation_prompt(checkpoint, concepts);
        let llm = Arc::clone(&self.llm);
        with_policy(self.policy, || {
            let llm = Arc::clone(&llm);
            let prompt = prompt.clone();
            async move { llm.complete(&prompt, REMEDIATION_MAX_TOKENS).await }
        })
        .await
        .ok()
        .filter(|text| !text.trim().is_empty())
    }
}

fn remediation_prompt(checkpoint: &Checkpoint, concepts: &BTreeSet<String>) -> String {
    let mut prompt = format!(
        "A learner studying \"{}\" struggled with the concepts below. Explain \
         all of them together in simple language, as if teaching a beginner, \
         using a concrete example for each.\n\nConcepts:\n",
        checkpoint.topic()
    );
    for concept in concepts {
        prompt.push_str("- ");
        prompt.push_str(concept);
        prompt.push('\n');
    }
    prompt
}

fn static_explanation(checkpoint: &Checkpoint, concepts: &BTreeSet<String>) -> String {
    let mut text = format!(
        "Review the following areas of \"{}\" before the next try:\n",
        checkpoint.topic()
    );
    for concept in concepts {
        text.push_str("- ");
        text.push_str(concept);
        text.push('\n');
    }
    text.push_str("Re-read the gathered material for each area and work through one example of your own.");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tutor_core::model::QuestionId;

    use crate::error::ProviderError;

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

    fn weak(concept: &str) -> GradeResult {
        GradeResult::new(QuestionId::new(), 40.0, "needs work", concept)
    }

    #[tokio::test]
    async fn one_explanation_covers_all_weak_concepts() {
        let r = Remediator::new(
            Arc::new(CannedLlm(Ok("Think of ownership like handing over a book.".into()))),
            CallPolicy::fast(),
        );
        let weak_results = vec![
            weak("Understand ownership moves"),
            weak("Understand borrowing rules"),
            weak("Understand ownership moves"),
        ];

        let record = r.remediate(&checkpoint(), &weak_results, 1).await;
        assert_eq!(record.attempt_number, 1);
        assert_eq!(record.concept_tags.len(), 2);
        assert!(record.explanation.contains("handing over a book"));
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_static_template() {
        let r = Remediator::new(
            Arc::new(CannedLlm(Err(ProviderError::Unavailable("down".into())))),
            CallPolicy::fast(),
        );
        let weak_results = vec![weak("Understand borrowing rules")];

        let record = r.remediate(&checkpoint(), &weak_results, 2).await;
        assert_eq!(record.attempt_number, 2);
        assert!(record.explanation.contains("Understand borrowing rules"));
        assert!(record.explanation.contains("Rust ownership"));
    }
}
