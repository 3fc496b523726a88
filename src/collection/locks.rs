//! Command-level lock policy.
//!
//! Each command class that reads or mutates the store for consistency owns a lock.
//! Two different classes may run at the same time; two calls of the same class never
//! overlap. `LockPolicy::single` maps every class onto one shared lock instead.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Show,
    Info,
    Clear,
    CheckExists,
    CountByAdmin,
    GroupCounting,
    Insert,
    InsertIfMax,
    Update,
    RemoveById,
    RemoveGreater,
    RemoveLower,
    RemoveByAdmin,
}

impl OperationClass {
    pub const ALL: [OperationClass; 13] = [
        OperationClass::Show,
        OperationClass::Info,
        OperationClass::Clear,
        OperationClass::CheckExists,
        OperationClass::CountByAdmin,
        OperationClass::GroupCounting,
        OperationClass::Insert,
        OperationClass::InsertIfMax,
        OperationClass::Update,
        OperationClass::RemoveById,
        OperationClass::RemoveGreater,
        OperationClass::RemoveLower,
        OperationClass::RemoveByAdmin,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Guard returned by [`LockPolicy::acquire`]; the lock is released when it is dropped.
pub type ClassGuard = OwnedMutexGuard<()>;

pub struct LockPolicy {
    locks: Vec<Arc<Mutex<()>>>,
}

impl LockPolicy {
    /// One independent lock per operation class.
    pub fn per_class() -> Self {
        Self {
            locks: OperationClass::ALL
                .iter()
                .map(|_| Arc::new(Mutex::new(())))
                .collect(),
        }
    }

    /// A single lock shared by every operation class.
    pub fn single() -> Self {
        let shared = Arc::new(Mutex::new(()));
        Self {
            locks: OperationClass::ALL.iter().map(|_| shared.clone()).collect(),
        }
    }

    pub async fn acquire(&self, class: OperationClass) -> ClassGuard {
        self.locks[class.index()].clone().lock_owned().await
    }

    /// Whether two classes are serialized against each other under this policy.
    pub fn shares_lock(&self, a: OperationClass, b: OperationClass) -> bool {
        Arc::ptr_eq(&self.locks[a.index()], &self.locks[b.index()])
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::per_class()
    }
}
