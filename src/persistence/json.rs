//! JSON snapshot repository.
//!
//! Keeps an [`InMemoryRepository`] and rewrites the whole snapshot file on every
//! mutation (write to a temporary sibling, then rename over the previous file). The
//! in-memory copy only changes after the new snapshot is on disk, so a failed write
//! leaves both exactly as they were.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::memory::InMemoryRepository;
use super::{RecordRepository, RepositoryError};
use crate::model::StudyGroup;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    records: Vec<StudyGroup>,
    users: Vec<UserEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserEntry {
    name: String,
    digest: String,
}

pub struct JsonFileRepository {
    path: PathBuf,
    inner: InMemoryRepository,
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    /// Opens the snapshot at `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Snapshot::default()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            Snapshot::default()
        };

        tracing::info!(
            "Loaded {} records and {} users from {}",
            snapshot.records.len(),
            snapshot.users.len(),
            path.display()
        );

        let users = snapshot
            .users
            .into_iter()
            .map(|u| (u.name, u.digest))
            .collect();

        Ok(Self {
            path,
            inner: InMemoryRepository::from_parts(snapshot.records, users),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes `records` and `users` as the new snapshot. Callers hold the write lock and
    /// only apply the change to `inner` once this returns `Ok`.
    fn write_snapshot(
        &self,
        records: Vec<StudyGroup>,
        users: Vec<(String, String)>,
    ) -> Result<(), RepositoryError> {
        let snapshot = Snapshot {
            records,
            users: users
                .into_iter()
                .map(|(name, digest)| UserEntry { name, digest })
                .collect(),
        };
        let text = serde_json::to_string_pretty(&snapshot)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_data()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!("Wrote snapshot to {}", self.path.display());
        Ok(())
    }
}

impl RecordRepository for JsonFileRepository {
    fn insert_record(&self, record: &StudyGroup) -> Result<(), RepositoryError> {
        let _guard = self.lock();
        let mut records = self.inner.query_all()?;
        if records.iter().any(|stored| stored.id == record.id) {
            return Err(RepositoryError::DuplicateRecord(record.id));
        }
        records.push(record.clone());

        self.write_snapshot(records, self.inner.users())?;
        self.inner.insert_record(record)
    }

    fn update_record(&self, record: &StudyGroup) -> Result<(), RepositoryError> {
        let _guard = self.lock();
        let mut records = self.inner.query_all()?;
        match records.iter_mut().find(|stored| stored.id == record.id) {
            Some(stored) => *stored = record.clone(),
            None => records.push(record.clone()),
        }

        self.write_snapshot(records, self.inner.users())?;
        self.inner.update_record(record)
    }

    fn delete_records(&self, ids: &[i32]) -> Result<(), RepositoryError> {
        let _guard = self.lock();
        let mut records = self.inner.query_all()?;
        records.retain(|stored| !ids.contains(&stored.id));

        self.write_snapshot(records, self.inner.users())?;
        self.inner.delete_records(ids)
    }

    fn delete_where_owner(&self, owner: &str) -> Result<usize, RepositoryError> {
        let _guard = self.lock();
        let mut records = self.inner.query_all()?;
        records.retain(|stored| stored.owner != owner);

        self.write_snapshot(records, self.inner.users())?;
        self.inner.delete_where_owner(owner)
    }

    fn query_all(&self) -> Result<Vec<StudyGroup>, RepositoryError> {
        self.inner.query_all()
    }

    fn user_exists(&self, name: &str, digest: &str) -> Result<bool, RepositoryError> {
        self.inner.user_exists(name, digest)
    }

    fn create_user(&self, name: &str, digest: &str) -> Result<bool, RepositoryError> {
        let _guard = self.lock();
        let mut users = self.inner.users();
        if users.iter().any(|(existing, _)| existing == name) {
            return Ok(false);
        }
        users.push((name.to_string(), digest.to_string()));

        self.write_snapshot(self.inner.query_all()?, users)?;
        self.inner.create_user(name, digest)
    }
}
