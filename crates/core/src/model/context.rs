use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ContextId;

/// Where a gathered context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrigin {
    UserNotes,
    WebSearch,
    Mixed,
}

impl ContextOrigin {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextOrigin::UserNotes => "user_notes",
            ContextOrigin::WebSearch => "web_search",
            ContextOrigin::Mixed => "mixed",
        }
    }

    /// Parse the persisted string form.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "user_notes" => Some(ContextOrigin::UserNotes),
            "web_search" => Some(ContextOrigin::WebSearch),
            "mixed" => Some(ContextOrigin::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for ContextOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 1-5 rating of how well gathered context covers checkpoint objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelevanceScore(u8);

impl RelevanceScore {
    pub const MIN: RelevanceScore = RelevanceScore(1);
    pub const MAX: RelevanceScore = RelevanceScore(5);

    /// Build a score, clamping into `1..=5`.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 5))
    }

    /// Build a score from a fractional rating, rounding then clamping.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self::new(value.round().clamp(1.0, 5.0) as u8)
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RelevanceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Raw study material gathered for one checkpoint attempt.
///
/// Contexts are append-only: retries add new instances, earlier ones are kept
/// for deduplication and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatheredContext {
    pub id: ContextId,
    pub origin: ContextOrigin,
    pub content: String,
    /// `None` until the relevance validator has scored the context.
    pub relevance: Option<RelevanceScore>,
    pub gathered_at: DateTime<Utc>,
}

impl GatheredContext {
    #[must_use]
    pub fn new(
        id: ContextId,
        origin: ContextOrigin,
        content: impl Into<String>,
        gathered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            origin,
            content: content.into(),
            relevance: None,
            gathered_at,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// An immutable slice of a gathered context, produced by deterministic
/// fixed-size splitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub text: String,
    pub origin_context_id: ContextId,
}
