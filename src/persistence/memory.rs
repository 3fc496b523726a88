use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{RecordRepository, RepositoryError};
use crate::model::StudyGroup;

#[derive(Default)]
pub struct InMemoryRepository {
    records: DashMap<i32, StudyGroup>,
    users: DashMap<String, String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(records: Vec<StudyGroup>, users: Vec<(String, String)>) -> Self {
        let repo = Self::new();
        for record in records {
            repo.records.insert(record.id, record);
        }
        for (name, digest) in users {
            repo.users.insert(name, digest);
        }
        repo
    }

    pub fn users(&self) -> Vec<(String, String)> {
        let mut users: Vec<(String, String)> = self
            .users
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        users.sort();
        users
    }
}

impl RecordRepository for InMemoryRepository {
    fn insert_record(&self, record: &StudyGroup) -> Result<(), RepositoryError> {
        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(RepositoryError::DuplicateRecord(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    fn update_record(&self, record: &StudyGroup) -> Result<(), RepositoryError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn delete_records(&self, ids: &[i32]) -> Result<(), RepositoryError> {
        for id in ids {
            self.records.remove(id);
        }
        Ok(())
    }

    fn delete_where_owner(&self, owner: &str) -> Result<usize, RepositoryError> {
        let before = self.records.len();
        self.records.retain(|_, record| record.owner != owner);
        Ok(before - self.records.len())
    }

    fn query_all(&self) -> Result<Vec<StudyGroup>, RepositoryError> {
        let mut records: Vec<StudyGroup> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.natural_cmp(b));
        Ok(records)
    }

    fn user_exists(&self, name: &str, digest: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .users
            .get(name)
            .map(|stored| stored.value() == digest)
            .unwrap_or(false))
    }

    fn create_user(&self, name: &str, digest: &str) -> Result<bool, RepositoryError> {
        match self.users.entry(name.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(digest.to_string());
                Ok(true)
            }
        }
    }
}
