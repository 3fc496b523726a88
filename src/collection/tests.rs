//! Collection Module Tests
//!
//! ## Test Scopes
//! - **Store contract**: insert/exists/remove, insert-if-max, owner rules, update.
//! - **Write-through**: a failing persist hook leaves the store untouched.
//! - **Lock policy**: same-class calls serialize, different classes do not.

#[cfg(test)]
mod tests {
    use crate::collection::locks::{LockPolicy, OperationClass};
    use crate::collection::store::{CollectionStore, StoreError};
    use crate::model::fixtures::{admin, draft, group};
    use crate::persistence::RepositoryError;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> CollectionStore {
        CollectionStore::new(LockPolicy::per_class())
    }

    // ============================================================
    // BASIC CONTRACT
    // ============================================================

    #[tokio::test]
    async fn test_insert_then_exists_then_remove() {
        // ARRANGE
        let store = store();
        let record = group(4, "alice");

        // ACT: insert
        store.insert(record.clone()).await.unwrap();

        // ASSERT
        assert!(store.exists(4).await);

        // ACT: remove
        let removed = store.remove_by_id(4, "alice").await.unwrap();

        // ASSERT
        assert_eq!(removed, record);
        assert!(!store.exists(4).await);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        // ARRANGE
        let store = store();
        store.insert(group(1, "alice")).await.unwrap();

        // ACT
        let err = store.insert(group(1, "bob")).await.unwrap_err();

        // ASSERT
        assert!(matches!(err, StoreError::DuplicateId(1)));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(1).await.unwrap().owner, "alice");
    }

    #[tokio::test]
    async fn test_allocated_ids_skip_inserted_ids() {
        // ARRANGE
        let store = store();
        store.insert(group(10, "alice")).await.unwrap();

        // ACT
        let next = store.allocate_id().unwrap();

        // ASSERT
        assert_eq!(next, 11);
        assert_ne!(store.allocate_id().unwrap(), next);
    }

    #[tokio::test]
    async fn test_id_space_exhaustion_is_an_error() {
        // ARRANGE
        let restored =
            CollectionStore::with_records(vec![group(i32::MAX, "a")], LockPolicy::default())
                .unwrap();
        let fresh = store();

        // ACT
        let allocated = restored.allocate_id();
        fresh.insert(group(i32::MAX, "a")).await.unwrap();

        // ASSERT
        assert!(matches!(allocated, Err(StoreError::IdsExhausted)));
        assert!(matches!(fresh.allocate_id(), Err(StoreError::IdsExhausted)));
        assert!(matches!(restored.allocate_id(), Err(StoreError::IdsExhausted)));
    }

    #[tokio::test]
    async fn test_with_records_resumes_id_counter_and_rejects_duplicates() {
        // ACT: restore distinct ids
        let restored =
            CollectionStore::with_records(vec![group(3, "a"), group(8, "b")], LockPolicy::default())
                .unwrap();

        // ASSERT
        assert_eq!(restored.allocate_id().unwrap(), 9);

        // ACT: restore a duplicated id
        let duplicated =
            CollectionStore::with_records(vec![group(3, "a"), group(3, "b")], LockPolicy::default());

        // ASSERT
        assert!(matches!(duplicated, Err(StoreError::DuplicateId(3))));
    }

    #[tokio::test]
    async fn test_snapshot_is_in_natural_order() {
        // ARRANGE
        let store = store();
        for id in [9, 2, 5] {
            store.insert(group(id, "alice")).await.unwrap();
        }

        // ACT
        let ids: Vec<i32> = store.snapshot().await.iter().map(|r| r.id).collect();

        // ASSERT
        assert_eq!(ids, vec![2, 5, 9]);
    }

    // ============================================================
    // INSERT IF MAX
    // ============================================================

    #[tokio::test]
    async fn test_insert_if_max_scenario() {
        let store = store();

        // ACT: empty store, then a smaller id
        assert!(store.insert_if_max(group(5, "alice")).await.unwrap());
        assert!(!store.insert_if_max(group(3, "alice")).await.unwrap());
        assert_eq!(store.len().await, 1);

        // ACT: a greater id
        assert!(store.insert_if_max(group(8, "alice")).await.unwrap());

        // ASSERT
        let ids: Vec<i32> = store.snapshot().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 8]);
    }

    #[tokio::test]
    async fn test_insert_if_max_never_decreases_maximum() {
        let store = store();
        let mut previous_max = None;

        for id in [4, 2, 7, 7, 1, 9, 8, 12, 3] {
            let _ = store.insert_if_max(group(id, "alice")).await.unwrap();
            let current = store.max().await.map(|r| r.id);
            if let (Some(prev), Some(cur)) = (previous_max, current) {
                assert!(cur >= prev, "maximum went from {} to {}", prev, cur);
            }
            previous_max = current;
        }

        assert_eq!(previous_max, Some(12));
    }

    // ============================================================
    // OWNERSHIP
    // ============================================================

    #[tokio::test]
    async fn test_remove_by_id_checks_owner() {
        // ARRANGE
        let store = store();
        store.insert(group(1, "alice")).await.unwrap();

        // ACT: foreign owner
        let err = store.remove_by_id(1, "mallory").await.unwrap_err();

        // ASSERT
        assert!(matches!(err, StoreError::NotOwner { id: 1, .. }));
        assert!(store.exists(1).await);

        // ACT: unknown id
        let missing = store.remove_by_id(99, "alice").await.unwrap_err();

        // ASSERT
        assert!(matches!(missing, StoreError::NotFound(99)));
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        // ARRANGE
        let store = store();
        let original = group(2, "alice");
        store.insert(original.clone()).await.unwrap();

        // ACT
        let mut replacement = draft("replacement");
        replacement.group_admin = admin("Carol", "P-7");
        let updated = store.update(2, "alice", replacement).await.unwrap();

        // ASSERT
        assert_eq!(updated.id, 2);
        assert_eq!(updated.creation_date, original.creation_date);
        assert_eq!(store.get(2).await.unwrap().group_admin.name, "Carol");
        assert_eq!(store.len().await, 1);

        // ACT: foreign owner
        let err = store.update(2, "bob", draft("x")).await.unwrap_err();

        // ASSERT
        assert!(matches!(err, StoreError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn test_clear_is_owner_scoped() {
        // ARRANGE
        let store = store();
        store.insert(group(1, "alice")).await.unwrap();
        store.insert(group(2, "bob")).await.unwrap();
        store.insert(group(3, "alice")).await.unwrap();

        // ACT & ASSERT
        assert_eq!(store.clear("alice").await, 2);
        let owners: Vec<String> = store.snapshot().await.into_iter().map(|r| r.owner).collect();
        assert_eq!(owners, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_where_relative_to_reference() {
        // ARRANGE
        let store = store();
        for id in 1..=6 {
            let owner = if id % 2 == 0 { "alice" } else { "bob" };
            store.insert(group(id, owner)).await.unwrap();
        }

        // ACT
        let removed = store
            .remove_where(|r| r.is_owned_by("alice") && r.id > 2)
            .await;

        // ASSERT
        let removed_ids: Vec<i32> = removed.iter().map(|r| r.id).collect();
        assert_eq!(removed_ids, vec![4, 6]);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_remove_first_matching_admin() {
        // ARRANGE
        let store = store();
        let carol = admin("Carol", "P-7");
        for id in 1..=3 {
            let mut record = group(id, "alice");
            record.group_admin = carol.clone();
            store.insert(record).await.unwrap();
        }

        // ACT
        let removed = store.remove_first_matching_admin(&carol, "alice").await;

        // ASSERT
        assert_eq!(removed.map(|r| r.id), Some(1));
        assert!(store.remove_first_matching_admin(&carol, "bob").await.is_none());
        assert_eq!(
            store.count_where(|r| r.group_admin == carol).await,
            2
        );
    }

    #[tokio::test]
    async fn test_passport_conflict() {
        // ARRANGE
        let store = store();
        store.insert(group(1, "alice")).await.unwrap();

        // ASSERT: read-only check
        assert!(!store.passport_conflict(&admin("Bob", "P-1"), None).await);
        assert!(store.passport_conflict(&admin("Impostor", "P-1"), None).await);
        assert!(!store.passport_conflict(&admin("Impostor", "P-1"), Some(1)).await);
        assert!(!store.passport_conflict(&admin("Dave", "P-2"), None).await);

        // ACT: a different person with a taken passport
        let mut impostor = group(2, "bob");
        impostor.group_admin = admin("Impostor", "P-1");
        let err = store.insert(impostor.clone()).await.unwrap_err();

        // ASSERT
        assert!(matches!(err, StoreError::PassportTaken(ref p) if p == "P-1"));
        assert!(matches!(
            store.insert_if_max(impostor).await,
            Err(StoreError::PassportTaken(_))
        ));

        // ACT: the record holding the passport changes its own admin
        let mut renamed = draft("group-1");
        renamed.group_admin = admin("Bob Jr", "P-1");
        let own = store.update(1, "alice", renamed).await;

        // ASSERT
        assert!(own.is_ok(), "own record may change its admin");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_cannot_share_a_passport() {
        let store = Arc::new(store());

        for round in 0..50 {
            // ARRANGE: two different people claiming the same passport.
            let passport = format!("R-{}", round);
            let mut first = group(2 * round + 1, "alice");
            first.group_admin = admin("First", &passport);
            let mut second = group(2 * round + 2, "bob");
            second.group_admin = admin("Second", &passport);

            // ACT
            let a = tokio::spawn({
                let store = store.clone();
                async move { store.insert(first).await }
            });
            let b = tokio::spawn({
                let store = store.clone();
                async move { store.insert(second).await }
            });
            let outcomes = [a.await.unwrap(), b.await.unwrap()];

            // ASSERT
            assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
            assert!(outcomes
                .iter()
                .any(|o| matches!(o, Err(StoreError::PassportTaken(_)))));
        }
        assert_eq!(store.len().await, 50);
    }

    // ============================================================
    // WRITE-THROUGH
    // ============================================================

    #[tokio::test]
    async fn test_failing_persist_hook_leaves_store_untouched() {
        // ARRANGE
        let store = store();
        store.insert(group(1, "alice")).await.unwrap();

        let fail = || RepositoryError::Serialization("disk full".to_string());

        // ACT: every mutation with a failing hook
        assert!(store.insert_with(group(2, "alice"), |_| Err(fail())).await.is_err());
        assert!(store
            .update_with(1, "alice", draft("changed"), |_| Err(fail()))
            .await
            .is_err());
        assert!(store.remove_by_id_with(1, "alice", |_| Err(fail())).await.is_err());
        assert!(store.clear_with("alice", |_| Err(fail())).await.is_err());

        // ASSERT
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "group-1");
    }

    // ============================================================
    // LOCK POLICY
    // ============================================================

    #[tokio::test]
    async fn test_per_class_policy_separates_classes() {
        let per_class = LockPolicy::per_class();
        assert!(per_class.shares_lock(OperationClass::Clear, OperationClass::Clear));
        assert!(!per_class.shares_lock(OperationClass::Clear, OperationClass::Show));

        let single = LockPolicy::single();
        assert!(single.shares_lock(OperationClass::Clear, OperationClass::Show));
    }

    #[tokio::test]
    async fn test_same_class_is_serialized_other_class_is_not() {
        // ARRANGE
        let policy = Arc::new(LockPolicy::per_class());

        let held = policy.acquire(OperationClass::Clear).await;

        // ACT & ASSERT: a different class
        let other = tokio::time::timeout(
            Duration::from_millis(100),
            policy.acquire(OperationClass::Show),
        )
        .await;
        assert!(other.is_ok(), "a different class must not wait");

        // ACT & ASSERT: the same class
        let same = tokio::time::timeout(
            Duration::from_millis(100),
            policy.acquire(OperationClass::Clear),
        )
        .await;
        assert!(same.is_err(), "the same class must wait for the holder");

        // ACT & ASSERT: after release
        drop(held);
        let after = tokio::time::timeout(
            Duration::from_millis(100),
            policy.acquire(OperationClass::Clear),
        )
        .await;
        assert!(after.is_ok());
    }
}
