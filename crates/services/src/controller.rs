//! The checkpoint attempt state machine.
//!
//! The controller exclusively owns every `CheckpointAttemptState`; callers
//! only ever see snapshots. An attempt suspends in exactly one place,
//! `AwaitingAnswers`, and resumes through `submit_answers`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use storage::{SessionRecord, Storage};
use tutor_core::chunker::{self, ChunkConfig};
use tutor_core::model::{
    AttemptId, AttemptStatus, Checkpoint, CheckpointAttemptState, ContextChunk, GatheredContext,
    GradeResult, LearnerAnswer, Question, RemediationRecord, SessionId, Stage, average_score,
};
use tutor_core::Clock;

use crate::context_source::{ContextSource, GatherStrategy};
use crate::error::EngineError;
use crate::grader::AnswerGrader;
use crate::generator::AssessmentGenerator;
use crate::remediator::Remediator;
use crate::validator::RelevanceValidator;

/// Tunable workflow bounds. Defaults match the production configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Minimum relevance score (1-5) for context to be accepted outright.
    pub validation_threshold: u8,
    /// Gather retries after the first round, not counting it.
    pub max_context_retries: u32,
    /// Remediation cycles before an attempt fails for good.
    pub max_remediation_attempts: u32,
    /// Questions per assessment cycle.
    pub question_count: usize,
    pub chunking: ChunkConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_threshold: 4,
            max_context_retries: 2,
            max_remediation_attempts: 2,
            question_count: crate::generator::DEFAULT_QUESTION_COUNT,
            chunking: ChunkConfig::default(),
        }
    }
}

/// Read-only snapshot of one attempt, safe to hand to callers.
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub state: CheckpointAttemptState,
    /// The current question set; empty before the first assessment cycle.
    pub questions: Vec<Question>,
    /// Grades from the most recent grading pass.
    pub grades: Vec<GradeResult>,
    pub remediations: Vec<RemediationRecord>,
}

struct Attempt {
    session: SessionId,
    checkpoint: Checkpoint,
    state: CheckpointAttemptState,
    strategy: GatherStrategy,
    chunks: Vec<ContextChunk>,
    questions: Vec<Question>,
    grades: Vec<GradeResult>,
    remediations: Vec<RemediationRecord>,
}

impl Attempt {
    fn snapshot(&self) -> AttemptState {
        AttemptState {
            state: self.state.clone(),
            questions: self.questions.clone(),
            grades: self.grades.clone(),
            remediations: self.remediations.clone(),
        }
    }

    fn transition(&mut self, stage: Stage) {
        info!(attempt = %self.state.attempt_id, from = %self.state.stage, to = %stage, "stage transition");
        self.state.stage = stage;
    }
}

/// Drives checkpoint attempts through gather, validate, assess, grade and
/// remediate, persisting at every suspension and terminal state.
pub struct CheckpointController {
    config: EngineConfig,
    source: Arc<dyn ContextSource>,
    validator: RelevanceValidator,
    generator: AssessmentGenerator,
    grader: AnswerGrader,
    remediator: Remediator,
    storage: Storage,
    clock: Clock,
    attempts: Mutex<HashMap<AttemptId, Attempt>>,
}

impl CheckpointController {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn ContextSource>,
        validator: RelevanceValidator,
        generator: AssessmentGenerator,
        grader: AnswerGrader,
        remediator: Remediator,
        storage: Storage,
        clock: Clock,
    ) -> Self {
        Self {
            config,
            source,
            validator,
            generator,
            grader,
            remediator,
            storage,
            clock,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Begin an attempt and run it to the first suspension point.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Provider` when context gathering fails with a
    /// permanent provider error, and `EngineError` on storage failures or a
    /// poisoned registry. Transient gather failures are absorbed by the
    /// normal low-relevance retry policy instead.
    pub async fn start(
        &self,
        session: SessionId,
        checkpoint: Checkpoint,
    ) -> Result<AttemptState, EngineError> {
        let attempt_id = AttemptId::new();
        let mut attempt = Attempt {
            session,
            checkpoint,
            state: CheckpointAttemptState::new(attempt_id, self.clock.now()),
            strategy: self.source.initial_strategy(),
            chunks: Vec::new(),
            questions: Vec::new(),
            grades: Vec::new(),
            remediations: Vec::new(),
        };

        let context = self.gather_validated(&mut attempt).await?;
        self.process(&mut attempt, &context);
        self.question(&mut attempt).await;
        self.suspend(&mut attempt).await?;

        let snapshot = attempt.snapshot();
        self.lock()?.insert(attempt_id, attempt);
        Ok(snapshot)
    }

    /// Resume a suspended attempt with the learner's answers.
    ///
    /// Submitting against an attempt that is not awaiting answers returns the
    /// already-computed snapshot unchanged, so retried submissions are safe.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownAttempt` for unknown ids,
    /// `EngineError::UnknownQuestion` when an answer references a question
    /// outside the current set, and `EngineError::MissingAnswers` when any
    /// current question has no answer.
    pub async fn submit_answers(
        &self,
        attempt_id: AttemptId,
        answers: Vec<LearnerAnswer>,
    ) -> Result<AttemptState, EngineError> {
        let mut attempt = {
            let mut registry = self.lock()?;
            let attempt = registry
                .get(&attempt_id)
                .ok_or(EngineError::UnknownAttempt)?;
            if attempt.state.stage != Stage::AwaitingAnswers {
                return Ok(attempt.snapshot());
            }
            check_answers(&attempt.questions, &answers)?;
            registry
                .remove(&attempt_id)
                .ok_or(EngineError::UnknownAttempt)?
        };

        let result = self.grade_and_decide(&mut attempt, &answers).await;
        let snapshot = attempt.snapshot();
        self.lock()?.insert(attempt_id, attempt);
        result?;
        Ok(snapshot)
    }

    /// Current snapshot of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownAttempt` for unknown ids.
    pub fn attempt_state(&self, attempt_id: AttemptId) -> Result<AttemptState, EngineError> {
        let registry = self.lock()?;
        registry
            .get(&attempt_id)
            .map(Attempt::snapshot)
            .ok_or(EngineError::UnknownAttempt)
    }

    /// Drop an attempt and clear its persisted in-progress state. The context
    /// audit log is kept.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownAttempt` for unknown ids.
    pub async fn abandon(&self, attempt_id: AttemptId) -> Result<(), EngineError> {
        let attempt = self
            .lock()?
            .remove(&attempt_id)
            .ok_or(EngineError::UnknownAttempt)?;
        let mut record = self.load_record(attempt.session).await?;
        record.attempt = None;
        record.updated_at = self.clock.now();
        self.storage.sessions.upsert_session(&record).await?;
        Ok(())
    }

    async fn gather_validated(
        &self,
        attempt: &mut Attempt,
    ) -> Result<GatheredContext, EngineError> {
        loop {
            attempt.transition(Stage::Gathering);
            let mut context = match self
                .source
                .gather(&attempt.checkpoint, attempt.strategy)
                .await
            {
                Ok(context) => context,
                Err(err) if err.is_transient() => {
                    warn!(attempt = %attempt.state.attempt_id, error = %err, "gather failed, treating as empty context");
                    GatheredContext::new(
                        tutor_core::model::ContextId::new(0),
                        tutor_core::model::ContextOrigin::WebSearch,
                        "",
                        self.clock.now(),
                    )
                }
                Err(err) => return Err(EngineError::Provider(err)),
            };

            attempt.transition(Stage::Validating);
            let judgment = self.validator.validate(&attempt.checkpoint, &context).await;
            context.relevance = Some(judgment.score);
            self.storage
                .contexts
                .append_context(attempt.session, &context)
                .await?;

            if judgment.score.value() >= self.config.validation_threshold {
                return Ok(context);
            }

            if attempt.state.context_retry_count < self.config.max_context_retries {
                attempt.state.context_retry_count += 1;
                attempt.strategy = attempt.strategy.escalate();
                info!(
                    attempt = %attempt.state.attempt_id,
                    retry = attempt.state.context_retry_count,
                    score = %judgment.score,
                    "context below threshold, retrying with wider strategy"
                );
                continue;
            }

            // Retries exhausted: proceed on what we have, flagged.
            let warning = format!(
                "proceeding on low-relevance context ({}): {}",
                judgment.score, judgment.rationale
            );
            warn!(attempt = %attempt.state.attempt_id, "{warning}");
            attempt.state.quality_warning = Some(warning);
            return Ok(context);
        }
    }

    fn process(&self, attempt: &mut Attempt, context: &GatheredContext) {
        attempt.transition(Stage::Processing);
        attempt.chunks = chunker::chunk_context(context, &self.config.chunking);
    }

    async fn question(&self, attempt: &mut Attempt) {
        attempt.transition(Stage::Questioning);
        attempt.questions = self
            .generator
            .generate(&attempt.checkpoint, &attempt.chunks)
            .await;
    }

    async fn suspend(&self, attempt: &mut Attempt) -> Result<(), EngineError> {
        attempt.transition(Stage::AwaitingAnswers);
        self.persist(attempt).await
    }

    async fn grade_and_decide(
        &self,
        attempt: &mut Attempt,
        answers: &[LearnerAnswer],
    ) -> Result<(), EngineError> {
        attempt.transition(Stage::Grading);
        attempt.grades = self
            .grader
            .grade(&attempt.checkpoint, &attempt.questions, answers, &attempt.chunks)
            .await;

        attempt.transition(Stage::Deciding);
        let average = average_score(&attempt.grades);
        attempt.state.average_score = Some(average);
        let pass_mark = attempt.checkpoint.pass_mark();

        if average >= pass_mark {
            attempt.transition(Stage::Passed);
            attempt.state.status = AttemptStatus::Passed;
            info!(attempt = %attempt.state.attempt_id, average, "checkpoint passed");
            return self.persist(attempt).await;
        }

        if attempt.state.remediation_count < self.config.max_remediation_attempts {
            attempt.transition(Stage::Remediating);
            attempt.state.remediation_count += 1;
            let threshold = attempt.checkpoint.success_threshold();
            let weak: Vec<GradeResult> = attempt
                .grades
                .iter()
                .filter(|g| g.is_weak(threshold))
                .cloned()
                .collect();
            let record = self
                .remediator
                .remediate(&attempt.checkpoint, &weak, attempt.state.remediation_count)
                .await;
            attempt.remediations.push(record);

            self.question(attempt).await;
            return self.suspend(attempt).await;
        }

        attempt.transition(Stage::FailedExhausted);
        attempt.state.status = AttemptStatus::FailedExhausted;
        info!(attempt = %attempt.state.attempt_id, average, "checkpoint failed, remediation exhausted");
        self.persist(attempt).await
    }

    async fn persist(&self, attempt: &Attempt) -> Result<(), EngineError> {
        let mut record = self.load_record(attempt.session).await?;
        record.attempt = if attempt.state.stage.is_terminal() {
            None
        } else {
            Some(attempt.state.clone())
        };
        record.updated_at = self.clock.now();
        self.storage.sessions.upsert_session(&record).await?;
        Ok(())
    }

    async fn load_record(&self, session: SessionId) -> Result<SessionRecord, EngineError> {
        Ok(self
            .storage
            .sessions
            .get_session(session)
            .await?
            .unwrap_or_else(|| SessionRecord::new(session, self.clock.now())))
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<AttemptId, Attempt>>, EngineError> {
        self.attempts.lock().map_err(|_| EngineError::Poisoned)
    }
}

fn check_answers(questions: &[Question], answers: &[LearnerAnswer]) -> Result<(), EngineError> {
    for answer in answers {
        if !questions.iter().any(|q| q.id() == answer.question_id) {
            return Err(EngineError::UnknownQuestion);
        }
    }
    let missing = questions
        .iter()
        .filter(|q| !answers.iter().any(|a| a.question_id == q.id()))
        .count();
    if missing > 0 {
        return Err(EngineError::MissingAnswers { count: missing });
    }
    Ok(())
}
