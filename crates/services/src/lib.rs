#![forbid(unsafe_code)]

pub mod context_source;
pub mod controller;
pub mod engine_services;
pub mod error;
pub mod generator;
pub mod grader;
pub mod offline;
pub mod parse;
pub mod path_service;
pub mod providers;
pub mod remediator;
pub mod validator;

pub use tutor_core::Clock;

pub use context_source::{ContextSource, GatherStrategy, NotesAndSearchSource};
pub use controller::{AttemptState, CheckpointController, EngineConfig};
pub use engine_services::EngineServices;
pub use error::{EngineError, ProviderError};
pub use generator::{AssessmentGenerator, DEFAULT_QUESTION_COUNT, fallback_questions};
pub use grader::AnswerGrader;
pub use offline::{AnswerSimulator, SimulatedSkill};
pub use path_service::{LearningPathService, PathProgress};
pub use providers::{
    CallPolicy, ChunkIndex, ChunkIndexer, CompletionProvider, LexicalIndexer, OpenAiCompletion,
    SearchHit, SearchProvider, TavilySearch,
};
pub use remediator::Remediator;
pub use validator::{RelevanceJudgment, RelevanceValidator};
