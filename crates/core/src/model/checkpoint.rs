use std::collections::BTreeSet;
use thiserror::Error;

/// Default mastery threshold: 70% of the maximum score.
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.70;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CheckpointError {
    #[error("checkpoint topic is empty")]
    EmptyTopic,

    #[error("checkpoint has no objectives")]
    NoObjectives,

    #[error("success threshold {value} is outside (0, 1]")]
    InvalidThreshold { value: f64 },
}

/// A single unit of learning: a topic, ordered objectives and a mastery
/// threshold. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    topic: String,
    objectives: Vec<String>,
    success_threshold: f64,
}

impl Checkpoint {
    /// Create a checkpoint with the default 70% mastery threshold.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::EmptyTopic` or `CheckpointError::NoObjectives`
    /// when the inputs are unusable.
    pub fn new(
        topic: impl Into<String>,
        objectives: Vec<String>,
    ) -> Result<Self, CheckpointError> {
        Self::with_threshold(topic, objectives, DEFAULT_SUCCESS_THRESHOLD)
    }

    /// Create a checkpoint with an explicit mastery threshold in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::InvalidThreshold` when the threshold is out
    /// of range, plus the `new` validation errors.
    pub fn with_threshold(
        topic: impl Into<String>,
        objectives: Vec<String>,
        success_threshold: f64,
    ) -> Result<Self, CheckpointError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(CheckpointError::EmptyTopic);
        }
        let objectives: Vec<String> = objectives
            .into_iter()
            .filter(|o| !o.trim().is_empty())
            .collect();
        if objectives.is_empty() {
            return Err(CheckpointError::NoObjectives);
        }
        if !(success_threshold > 0.0 && success_threshold <= 1.0) {
            return Err(CheckpointError::InvalidThreshold {
                value: success_threshold,
            });
        }

        Ok(Self {
            topic,
            objectives,
            success_threshold,
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn objectives(&self) -> &[String] {
        &self.objectives
    }

    #[must_use]
    pub fn success_threshold(&self) -> f64 {
        self.success_threshold
    }

    /// The mastery threshold on the 0-100 grading scale.
    #[must_use]
    pub fn pass_mark(&self) -> f64 {
        self.success_threshold * 100.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    #[error("learning path has no checkpoints")]
    Empty,

    #[error("current index {index} is out of range for {len} checkpoints")]
    IndexOutOfRange { index: usize, len: usize },
}

/// An ordered sequence of checkpoints with progression tracking.
///
/// The current index only advances after the active checkpoint passes, or
/// through an explicit operator override.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningPath {
    checkpoints: Vec<Checkpoint>,
    current_index: usize,
    completed: BTreeSet<usize>,
}

impl LearningPath {
    /// Create a path starting at the first checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `PathError::Empty` when no checkpoints are provided.
    pub fn new(checkpoints: Vec<Checkpoint>) -> Result<Self, PathError> {
        if checkpoints.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self {
            checkpoints,
            current_index: 0,
            completed: BTreeSet::new(),
        })
    }

    /// Rehydrate a path from persisted progression state.
    ///
    /// # Errors
    ///
    /// Returns `PathError::IndexOutOfRange` when the persisted index does not
    /// fit the checkpoint list (an index equal to the length means finished).
    pub fn from_persisted(
        checkpoints: Vec<Checkpoint>,
        current_index: usize,
        completed: BTreeSet<usize>,
    ) -> Result<Self, PathError> {
        if checkpoints.is_empty() {
            return Err(PathError::Empty);
        }
        if current_index > checkpoints.len() {
            return Err(PathError::IndexOutOfRange {
                index: current_index,
                len: checkpoints.len(),
            });
        }
        if let Some(max) = completed.iter().next_back() {
            if *max >= checkpoints.len() {
                return Err(PathError::IndexOutOfRange {
                    index: *max,
                    len: checkpoints.len(),
                });
            }
        }
        Ok(Self {
            checkpoints,
            current_index,
            completed,
        })
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    /// The active checkpoint, or `None` once the path is finished.
    #[must_use]
    pub fn current(&self) -> Option<&Checkpoint> {
        self.checkpoints.get(self.current_index)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current_index >= self.checkpoints.len()
    }

    /// Record a terminal PASS for the active checkpoint and advance.
    ///
    /// Has no effect when the path is already finished.
    pub fn advance_passed(&mut self) {
        if self.is_finished() {
            return;
        }
        self.completed.insert(self.current_index);
        self.current_index += 1;
    }

    /// Operator override: advance without marking the checkpoint completed.
    pub fn force_advance(&mut self) {
        if self.is_finished() {
            return;
        }
        self.current_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(topic: &str) -> Checkpoint {
        Checkpoint::new(topic, vec!["Understand the basics".into()]).unwrap()
    }

    #[test]
    fn checkpoint_rejects_empty_objectives() {
        let err = Checkpoint::new("Rust ownership", vec![]).unwrap_err();
        assert_eq!(err, CheckpointError::NoObjectives);

        let err = Checkpoint::new("Rust ownership", vec!["   ".into()]).unwrap_err();
        assert_eq!(err, CheckpointError::NoObjectives);
    }

    #[test]
    fn checkpoint_rejects_out_of_range_threshold() {
        let objectives = vec!["Understand borrowing".to_string()];
        assert!(Checkpoint::with_threshold("Rust", objectives.clone(), 0.0).is_err());
        assert!(Checkpoint::with_threshold("Rust", objectives.clone(), 1.5).is_err());
        assert!(Checkpoint::with_threshold("Rust", objectives, 1.0).is_ok());
    }

    #[test]
    fn checkpoint_default_threshold_is_seventy_percent() {
        let cp = checkpoint("Rust");
        assert!((cp.success_threshold() - 0.70).abs() < f64::EPSILON);
        assert!((cp.pass_mark() - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn path_advances_only_through_pass_or_override() {
        let mut path =
            LearningPath::new(vec![checkpoint("A"), checkpoint("B"), checkpoint("C")]).unwrap();
        assert_eq!(path.current_index(), 0);

        path.advance_passed();
        assert_eq!(path.current_index(), 1);
        assert!(path.completed().contains(&0));

        path.force_advance();
        assert_eq!(path.current_index(), 2);
        assert!(!path.completed().contains(&1));

        path.advance_passed();
        assert!(path.is_finished());
        assert!(path.current().is_none());

        // no-op once finished
        path.advance_passed();
        assert_eq!(path.current_index(), 3);
    }

    #[test]
    fn path_rehydrates_from_persisted_state() {
        let checkpoints = vec![checkpoint("A"), checkpoint("B")];
        let completed: BTreeSet<usize> = [0].into_iter().collect();
        let path = LearningPath::from_persisted(checkpoints.clone(), 1, completed).unwrap();
        assert_eq!(path.current().unwrap().topic(), "B");

        let bad = LearningPath::from_persisted(checkpoints, 5, BTreeSet::new());
        assert!(bad.is_err());
    }
}
