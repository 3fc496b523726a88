use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::persistence::{RecordRepository, RepositoryError};

/// One-way, deterministic credential function with fixed-length hex output.
pub trait Hasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub struct AuthGate {
    repository: Arc<dyn RecordRepository>,
}

impl AuthGate {
    pub fn new(repository: Arc<dyn RecordRepository>) -> Self {
        Self { repository }
    }

    pub fn verify(&self, username: &str, digest: &str) -> Result<bool, RepositoryError> {
        if username.is_empty() || digest.is_empty() {
            return Ok(false);
        }
        self.repository.user_exists(username, digest)
    }

    /// Creates the user; `false` when the name is taken or empty.
    pub fn register(&self, username: &str, digest: &str) -> Result<bool, RepositoryError> {
        if username.trim().is_empty() || digest.is_empty() {
            return Ok(false);
        }
        let created = self.repository.create_user(username, digest)?;
        if created {
            tracing::info!("Registered user {}", username);
        }
        Ok(created)
    }
}
