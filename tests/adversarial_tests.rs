//! Adversarial tests for forum-acl
//!
//! These tests exercise hostile and corrupted inputs: cyclic trees,
//! runaway depth, invalid policy input, anonymous-user injection, and
//! storage failures mid-save.

use forum_acl::{
    AccessError, AccessRecord, AccessRecordStore, AccessStorage, CategoryRole, Facet,
    MemoryStorage, MemoryTree, ObjectKind, Permission, PermissionRow, Role, RowBatch, SettingsRow,
    UserRow,
};
use std::collections::BTreeSet;

#[test]
fn test_resolution_detects_parent_cycle() {
    // 1 -> 2 -> 3 -> 1
    let mut tree = MemoryTree::new();
    tree.insert(1, 3);
    tree.insert(2, 1);
    tree.insert(3, 2);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);

    for facet_probe in [
        store.effective_members(1),
        store.effective_moderators(2),
    ] {
        assert!(matches!(facet_probe, Err(AccessError::DataIntegrity(_))));
    }
    assert!(matches!(
        store.effective_permissions(3),
        Err(AccessError::DataIntegrity(_))
    ));
}

#[test]
fn test_cascade_detects_child_cycle() {
    let mut tree = MemoryTree::new();
    tree.insert(1, 2);
    tree.insert(2, 1);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);

    assert!(matches!(
        store.ids_affected_by_inheritance(&[1], Facet::Members),
        Err(AccessError::DataIntegrity(_))
    ));

    // A save seeded inside the cycle must fail, not loop.
    let mut record = AccessRecord::new(1);
    record.set_members(false, [5]);
    assert!(matches!(
        store.save(&record),
        Err(AccessError::DataIntegrity(_))
    ));
}

#[test]
fn test_runaway_depth_is_fatal() {
    // A cycle-free chain deeper than the walk bound.
    let mut tree = MemoryTree::new();
    for id in 1..=300u64 {
        tree.insert(id, id - 1);
    }
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);
    assert!(matches!(
        store.effective_members(300),
        Err(AccessError::DataIntegrity(_))
    ));
}

#[test]
fn test_bogus_policy_input_rejected_without_mutation() {
    let mut record = AccessRecord::new(1);
    record
        .set_permissions(
            false,
            [(Role::Member, ObjectKind::Topic, Permission::Create)],
        )
        .expect("valid grant");
    let before = record.clone();

    let err = record
        .set_permission_labels(
            false,
            [("bogus_role", vec![("topic", vec!["create"])])],
        )
        .expect_err("unknown role must be rejected");
    assert!(matches!(err, AccessError::InvalidPolicy(_)));
    assert_eq!(record, before);

    let err = record
        .set_permission_labels(false, [("member", vec![("widget", vec!["create"])])])
        .expect_err("unknown kind must be rejected");
    assert!(matches!(err, AccessError::InvalidPolicy(_)));

    let err = record
        .set_permission_labels(false, [("member", vec![("topic", vec!["explode"])])])
        .expect_err("unknown permission must be rejected");
    assert!(matches!(err, AccessError::InvalidPolicy(_)));
    assert_eq!(record, before);
}

#[test]
fn test_anonymous_injection_never_reaches_storage() {
    let mut tree = MemoryTree::new();
    tree.insert(1, 0);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);

    let mut record = AccessRecord::new(1);
    record.set_members(false, [0, 0, 0, 7]);
    record.set_moderators(false, [0]);
    store.save(&record).expect("save");

    let rows = store.storage().load_users(&[1]).expect("load rows");
    for row in &rows[&1] {
        assert_ne!(row.user_id, 0, "anonymous id must never be persisted");
    }
    assert_eq!(
        store.effective_members(1).expect("resolve"),
        BTreeSet::from([7])
    );
    assert!(store.effective_moderators(1).expect("resolve").is_empty());
}

#[test]
fn test_storage_failure_rolls_back_whole_cascade() {
    let mut tree = MemoryTree::new();
    tree.insert(1, 0);
    tree.insert(2, 1);
    tree.insert(3, 2);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);

    let mut record = AccessRecord::new(1);
    record.set_members(false, [5]);
    record
        .set_permissions(
            false,
            [(Role::Member, ObjectKind::Topic, Permission::Create)],
        )
        .expect("valid grant");

    store.storage().fail_next_apply();
    assert!(matches!(store.save(&record), Err(AccessError::Storage(_))));

    // No partial rows anywhere on the would-be cascade path.
    assert!(store.storage().load_settings(&[1, 2, 3]).expect("settings").is_empty());
    assert_eq!(store.storage().user_row_count(), 0);
    assert_eq!(store.storage().permission_row_count(), 0);

    // The failure is not sticky: the same save succeeds afterwards.
    let outcome = store.save(&record).expect("retry");
    assert_eq!(outcome.affected, BTreeSet::from([1, 2, 3]));
}

#[test]
fn test_corrupted_permission_rows_fail_integrity_check() {
    let mut tree = MemoryTree::new();
    tree.insert(1, 0);
    let storage = MemoryStorage::new();

    // Bypass the store and plant rows that violate the catalog: `create`
    // does not exist for categories.
    let mut batch = RowBatch::new();
    batch.settings.push(SettingsRow {
        category_id: 1,
        inherit_members: true,
        inherit_moderators: true,
        inherit_permissions: false,
    });
    batch.insert_permissions.push(PermissionRow {
        category_id: 1,
        role: Role::Member,
        kind: ObjectKind::Category,
        permission: Permission::Create,
    });
    storage.apply(batch).expect("plant rows");

    let store = AccessRecordStore::new(storage, tree);
    assert!(matches!(
        store.load(1),
        Err(AccessError::DataIntegrity(_))
    ));
}

#[test]
fn test_materialized_rows_do_not_leak_into_inheriting_record() {
    let mut tree = MemoryTree::new();
    tree.insert(1, 0);
    tree.insert(2, 1);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);

    let mut a = AccessRecord::new(1);
    a.set_members(false, [7]);
    store.save(&a).expect("save A");

    // The cascade materialized member rows for category 2, but 2 still
    // inherits: its raw record must stay empty and fully inheriting.
    let rows = store.storage().load_users(&[2]).expect("rows");
    assert_eq!(
        rows[&2],
        vec![UserRow {
            category_id: 2,
            user_id: 7,
            role: CategoryRole::Member,
        }]
    );
    let b = store.load(2).expect("load B");
    assert!(b.inherit_members());
    assert!(b.members().is_empty());
}

#[test]
fn test_cascade_batch_replaces_stale_materialized_rows() {
    let mut tree = MemoryTree::new();
    tree.insert(1, 0);
    tree.insert(2, 1);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);

    let mut a = AccessRecord::new(1);
    a.set_members(false, [7, 8]);
    store.save(&a).expect("save A");

    a.set_members(false, [9]);
    store.save(&a).expect("save A again");

    // Old rows are gone across the whole cascade, not just the seed.
    for id in [1u64, 2] {
        let rows = store.storage().load_users(&[id]).expect("rows");
        let users: Vec<u64> = rows[&id].iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec![9], "category {id}");
    }
}
