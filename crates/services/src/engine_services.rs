use std::sync::Arc;

use storage::Storage;
use tutor_core::Clock;

use crate::context_source::{ContextSource, NotesAndSearchSource};
use crate::controller::{CheckpointController, EngineConfig};
use crate::error::EngineError;
use crate::generator::AssessmentGenerator;
use crate::grader::AnswerGrader;
use crate::path_service::LearningPathService;
use crate::providers::{
    CallPolicy, CompletionProvider, LexicalIndexer, OpenAiCompletion, SearchProvider,
    TavilySearch,
};
use crate::remediator::Remediator;
use crate::validator::RelevanceValidator;

/// Assembles the workflow engine from storage, providers and configuration.
#[derive(Clone)]
pub struct EngineServices {
    controller: Arc<CheckpointController>,
    paths: Arc<LearningPathService>,
    storage: Storage,
}

impl EngineServices {
    /// Build an engine backed by `SQLite` storage and environment-configured
    /// providers.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        config: EngineConfig,
        clock: Clock,
        learner_notes: Option<String>,
    ) -> Result<Self, EngineError> {
        let storage = Storage::sqlite(db_url).await?;
        let llm: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompletion::from_env());
        let search: Arc<dyn SearchProvider> = Arc::new(TavilySearch::from_env());
        let policy = CallPolicy::default();
        let source = Arc::new(NotesAndSearchSource::new(
            learner_notes,
            search,
            policy,
            clock,
        ));
        Ok(Self::assemble(config, source, llm, policy, storage, clock))
    }

    /// Build an engine from explicit providers, for tests and embedders.
    #[must_use]
    pub fn with_providers(
        config: EngineConfig,
        source: Arc<dyn ContextSource>,
        llm: Arc<dyn CompletionProvider>,
        policy: CallPolicy,
        storage: Storage,
        clock: Clock,
    ) -> Self {
        Self::assemble(config, source, llm, policy, storage, clock)
    }

    fn assemble(
        config: EngineConfig,
        source: Arc<dyn ContextSource>,
        llm: Arc<dyn CompletionProvider>,
        policy: CallPolicy,
        storage: Storage,
        clock: Clock,
    ) -> Self {
        let validator = RelevanceValidator::new(Arc::clone(&llm), policy);
        let generator = AssessmentGenerator::new(
            Arc::clone(&llm),
            Box::new(LexicalIndexer),
            policy,
            config.question_count,
        );
        let grader = AnswerGrader::new(Arc::clone(&llm), policy);
        let remediator = Remediator::new(llm, policy);

        let controller = Arc::new(CheckpointController::new(
            config,
            source,
            validator,
            generator,
            grader,
            remediator,
            storage.clone(),
            clock,
        ));
        let paths = Arc::new(LearningPathService::new(storage.clone(), clock));

        Self {
            controller,
            paths,
            storage,
        }
    }

    #[must_use]
    pub fn controller(&self) -> Arc<CheckpointController> {
        Arc::clone(&self.controller)
    }

    #[must_use]
    pub fn paths(&self) -> Arc<LearningPathService> {
        Arc::clone(&self.paths)
    }

    #[must_use]
    pub fn storage(&self) -> Storage {
        self.storage.clone()
    }
}
