//! Collection Store
//!
//! The server's in-memory set of study groups, ordered by identifier.
//!
//! ## Core Concepts
//! - **Uniqueness**: The store is a `BTreeMap` keyed by id, so two live records can never
//!   share an identifier and every snapshot comes out in natural order.
//! - **Ownership**: Mutations that target existing records only touch records owned by the
//!   caller.
//! - **Write-through**: Every mutation accepts a `persist` hook that runs under the write
//!   guard before the map changes. If the hook fails, nothing is mutated.
//! - **Lock policy**: Command handlers serialize themselves through `LockPolicy`, one lock
//!   per operation class by default.

pub mod locks;
pub mod store;

pub use locks::{LockPolicy, OperationClass};
pub use store::{CollectionStore, StoreError, StoreInfo};

#[cfg(test)]
mod tests;
