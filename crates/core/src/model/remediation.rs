use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A simplified "Feynman-style" explanation covering every currently weak
/// concept, produced before the learner retries a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationRecord {
    pub concept_tags: BTreeSet<String>,
    pub explanation: String,
    /// Monotonically increasing per checkpoint attempt.
    pub attempt_number: u32,
}

impl RemediationRecord {
    #[must_use]
    pub fn new(
        concept_tags: BTreeSet<String>,
        explanation: impl Into<String>,
        attempt_number: u32,
    ) -> Self {
        Self {
            concept_tags,
            explanation: explanation.into(),
            attempt_number,
        }
    }
}
