//! Persistent Record Store
//!
//! The durable backend behind the in-memory collection, reached through the narrow
//! `RecordRepository` contract. The server only ever needs to insert, replace and delete
//! records, load everything at startup, and check or create users.
//!
//! ## Implementations
//! - **`memory`**: `InMemoryRepository`, a `DashMap`-backed store for tests and
//!   ephemeral servers.
//! - **`json`**: `JsonFileRepository`, which keeps an in-memory copy and rewrites a JSON
//!   snapshot file after every mutation.

pub mod json;
pub mod memory;

pub use json::JsonFileRepository;
pub use memory::InMemoryRepository;

use thiserror::Error;

use crate::model::StudyGroup;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("repository serialization error: {0}")]
    Serialization(String),

    #[error("record {0} already stored")]
    DuplicateRecord(i32),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

pub trait RecordRepository: Send + Sync {
    fn insert_record(&self, record: &StudyGroup) -> Result<(), RepositoryError>;

    fn update_record(&self, record: &StudyGroup) -> Result<(), RepositoryError>;

    fn delete_records(&self, ids: &[i32]) -> Result<(), RepositoryError>;

    /// Deletes every record owned by `owner`; returns how many were removed.
    fn delete_where_owner(&self, owner: &str) -> Result<usize, RepositoryError>;

    fn query_all(&self) -> Result<Vec<StudyGroup>, RepositoryError>;

    fn user_exists(&self, name: &str, digest: &str) -> Result<bool, RepositoryError>;

    /// Creates the user; returns `false` if the name is already taken.
    fn create_user(&self, name: &str, digest: &str) -> Result<bool, RepositoryError>;
}
