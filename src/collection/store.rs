use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

use super::locks::LockPolicy;
use crate::model::{Person, StudyGroup, StudyGroupDraft};
use crate::persistence::RepositoryError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("group {0} already exists")]
    DuplicateId(i32),

    #[error("no group with id {0}")]
    NotFound(i32),

    #[error("group {id} belongs to {owner}")]
    NotOwner { id: i32, owner: String },

    #[error("passport id {0} already belongs to another person")]
    PassportTaken(String),

    #[error("no identifiers left")]
    IdsExhausted,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreInfo {
    pub kind: &'static str,
    pub initialized_at: DateTime<Utc>,
    pub size: usize,
}

type PersistResult = Result<(), RepositoryError>;

fn no_persist<T: ?Sized>(_: &T) -> PersistResult {
    Ok(())
}

/// Refuses `admin` when another record (other than `except`) holds a different person
/// under the same passport id.
fn check_passport(
    records: &BTreeMap<i32, StudyGroup>,
    admin: &Person,
    except: Option<i32>,
) -> Result<(), StoreError> {
    let taken = records.values().any(|r| {
        Some(r.id) != except
            && r.group_admin.passport_id == admin.passport_id
            && &r.group_admin != admin
    });
    if taken {
        return Err(StoreError::PassportTaken(admin.passport_id.clone()));
    }
    Ok(())
}

/// Ordered, unique-keyed collection of study groups.
pub struct CollectionStore {
    records: RwLock<BTreeMap<i32, StudyGroup>>,
    // Wider than an id so the counter itself never overflows.
    next_id: AtomicI64,
    initialized_at: DateTime<Utc>,
    locks: LockPolicy,
}

impl CollectionStore {
    pub fn new(locks: LockPolicy) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            initialized_at: Utc::now(),
            locks,
        }
    }

    /// Builds a store from previously persisted records.
    pub fn with_records(records: Vec<StudyGroup>, locks: LockPolicy) -> Result<Self, StoreError> {
        let mut map = BTreeMap::new();
        for record in records {
            let id = record.id;
            if map.insert(id, record).is_some() {
                return Err(StoreError::DuplicateId(id));
            }
        }
        let next_id = map.keys().next_back().map(|&id| i64::from(id) + 1).unwrap_or(1);

        Ok(Self {
            records: RwLock::new(map),
            next_id: AtomicI64::new(next_id),
            initialized_at: Utc::now(),
            locks,
        })
    }

    pub fn locks(&self) -> &LockPolicy {
        &self.locks
    }

    /// Hands out a fresh identifier; identifiers are never handed out twice.
    pub fn allocate_id(&self) -> Result<i32, StoreError> {
        let next = self.next_id.fetch_add(1, Ordering::SeqCst);
        i32::try_from(next).map_err(|_| {
            tracing::error!("Identifier space exhausted at {}", next);
            StoreError::IdsExhausted
        })
    }

    pub async fn insert(&self, record: StudyGroup) -> Result<(), StoreError> {
        self.insert_with(record, no_persist).await
    }

    pub async fn insert_with<F>(&self, record: StudyGroup, persist: F) -> Result<(), StoreError>
    where
        F: FnOnce(&StudyGroup) -> PersistResult,
    {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            tracing::error!("Refusing duplicate insert of group {}", record.id);
            return Err(StoreError::DuplicateId(record.id));
        }
        check_passport(&records, &record.group_admin, None)?;
        persist(&record)?;
        self.next_id
            .fetch_max(i64::from(record.id) + 1, Ordering::SeqCst);
        records.insert(record.id, record);
        Ok(())
    }

    pub async fn insert_if_max(&self, record: StudyGroup) -> Result<bool, StoreError> {
        self.insert_if_max_with(record, no_persist).await
    }

    /// Inserts `record` only if the store is empty or it is strictly greater than the
    /// current maximum. Returns whether it was inserted.
    pub async fn insert_if_max_with<F>(
        &self,
        record: StudyGroup,
        persist: F,
    ) -> Result<bool, StoreError>
    where
        F: FnOnce(&StudyGroup) -> PersistResult,
    {
        let mut records = self.records.write().await;
        let is_max = match records.values().next_back() {
            Some(max) => record.natural_cmp(max).is_gt(),
            None => true,
        };
        if !is_max {
            return Ok(false);
        }
        if records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        check_passport(&records, &record.group_admin, None)?;
        persist(&record)?;
        self.next_id
            .fetch_max(i64::from(record.id) + 1, Ordering::SeqCst);
        records.insert(record.id, record);
        Ok(true)
    }

    pub async fn remove_by_id(&self, id: i32, owner: &str) -> Result<StudyGroup, StoreError> {
        self.remove_by_id_with(id, owner, no_persist).await
    }

    pub async fn remove_by_id_with<F>(
        &self,
        id: i32,
        owner: &str,
        persist: F,
    ) -> Result<StudyGroup, StoreError>
    where
        F: FnOnce(&[i32]) -> PersistResult,
    {
        let mut records = self.records.write().await;
        let existing = records.get(&id).ok_or(StoreError::NotFound(id))?;
        if !existing.is_owned_by(owner) {
            return Err(StoreError::NotOwner {
                id,
                owner: existing.owner.clone(),
            });
        }
        persist(&[id])?;
        records.remove(&id).ok_or(StoreError::NotFound(id))
    }

    pub async fn remove_where<P>(&self, predicate: P) -> Vec<StudyGroup>
    where
        P: Fn(&StudyGroup) -> bool,
    {
        // Without a persist hook removal cannot fail.
        self.remove_where_with(predicate, no_persist)
            .await
            .unwrap_or_default()
    }

    /// Removes every record matching `predicate`, returning them in natural order.
    pub async fn remove_where_with<P, F>(
        &self,
        predicate: P,
        persist: F,
    ) -> Result<Vec<StudyGroup>, StoreError>
    where
        P: Fn(&StudyGroup) -> bool,
        F: FnOnce(&[i32]) -> PersistResult,
    {
        let mut records = self.records.write().await;
        let doomed: Vec<i32> = records
            .values()
            .filter(|r| predicate(r))
            .map(|r| r.id)
            .collect();
        if doomed.is_empty() {
            return Ok(Vec::new());
        }
        persist(&doomed)?;
        Ok(doomed.iter().filter_map(|id| records.remove(id)).collect())
    }

    pub async fn remove_first_matching_admin(
        &self,
        admin: &Person,
        owner: &str,
    ) -> Option<StudyGroup> {
        self.remove_first_matching_admin_with(admin, owner, no_persist)
            .await
            .ok()
            .flatten()
    }

    /// Removes the lowest-id record owned by `owner` whose administrator equals `admin`.
    pub async fn remove_first_matching_admin_with<F>(
        &self,
        admin: &Person,
        owner: &str,
        persist: F,
    ) -> Result<Option<StudyGroup>, StoreError>
    where
        F: FnOnce(&[i32]) -> PersistResult,
    {
        let mut records = self.records.write().await;
        let found = records
            .values()
            .find(|r| r.is_owned_by(owner) && &r.group_admin == admin)
            .map(|r| r.id);

        match found {
            Some(id) => {
                persist(&[id])?;
                Ok(records.remove(&id))
            }
            None => Ok(None),
        }
    }

    pub async fn update(
        &self,
        id: i32,
        owner: &str,
        draft: StudyGroupDraft,
    ) -> Result<StudyGroup, StoreError> {
        self.update_with(id, owner, draft, no_persist).await
    }

    /// Replaces record `id` with `draft`, keeping id, owner and creation date.
    ///
    /// The old value is removed and the new one inserted under one write guard.
    pub async fn update_with<F>(
        &self,
        id: i32,
        owner: &str,
        draft: StudyGroupDraft,
        persist: F,
    ) -> Result<StudyGroup, StoreError>
    where
        F: FnOnce(&StudyGroup) -> PersistResult,
    {
        let mut records = self.records.write().await;
        let existing = records.get(&id).ok_or(StoreError::NotFound(id))?;
        if !existing.is_owned_by(owner) {
            return Err(StoreError::NotOwner {
                id,
                owner: existing.owner.clone(),
            });
        }
        check_passport(&records, &draft.group_admin, Some(id))?;
        let replacement = existing.with_draft(draft);
        persist(&replacement)?;

        records.remove(&id);
        records.insert(id, replacement.clone());
        Ok(replacement)
    }

    pub async fn clear(&self, owner: &str) -> usize {
        self.clear_with(owner, |_| Ok(())).await.unwrap_or_default()
    }

    /// Removes every record owned by `owner`. Returns how many were removed.
    pub async fn clear_with<F>(&self, owner: &str, persist: F) -> Result<usize, StoreError>
    where
        F: FnOnce(&str) -> PersistResult,
    {
        let mut records = self.records.write().await;
        persist(owner)?;
        let before = records.len();
        records.retain(|_, r| !r.is_owned_by(owner));
        Ok(before - records.len())
    }

    /// Point-in-time copy of the collection in natural order.
    pub async fn snapshot(&self) -> Vec<StudyGroup> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn count_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&StudyGroup) -> bool,
    {
        self.records
            .read()
            .await
            .values()
            .filter(|r| predicate(r))
            .count()
    }

    pub async fn exists(&self, id: i32) -> bool {
        self.records.read().await.contains_key(&id)
    }

    pub async fn get(&self, id: i32) -> Option<StudyGroup> {
        self.records.read().await.get(&id).cloned()
    }

    pub async fn max(&self) -> Option<StudyGroup> {
        self.records.read().await.values().next_back().cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Whether `admin`'s passport id already belongs to a different person in any record
    /// other than `except`.
    ///
    /// Inserts and updates apply the same check under their write guard.
    pub async fn passport_conflict(&self, admin: &Person, except: Option<i32>) -> bool {
        check_passport(&*self.records.read().await, admin, except).is_err()
    }

    pub async fn info(&self) -> StoreInfo {
        StoreInfo {
            kind: "BTreeMap<i32, StudyGroup>",
            initialized_at: self.initialized_at,
            size: self.len().await,
        }
    }
}

impl Default for CollectionStore {
    fn default() -> Self {
        Self::new(LockPolicy::default())
    }
}
