#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    ContextAuditRepository, InMemoryRepository, SessionRecord, SessionRepository, Storage,
    StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
