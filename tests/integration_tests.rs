//! Integration tests for forum-acl
//!
//! These tests verify end-to-end behavior across modules: record
//! persistence, inheritance resolution, cascade writes, and the decision
//! engine over both storage backends.

use forum_acl::{
    AccessDecisionEngine, AccessRecord, AccessRecordStore, AccessStorage, AccessTarget, Actor,
    CategoryField, MemoryContent, MemoryStorage, MemoryTree, ObjectKind, Operation, Permission,
    ReplyMode, ReplyView, RocksDbStorage, Role, TopicView,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// root(0) -> A(1) -> B(2), plus C(3) directly under root.
fn small_tree() -> MemoryTree {
    let mut tree = MemoryTree::new();
    tree.insert(1, 0);
    tree.insert(2, 1);
    tree.insert(3, 0);
    tree
}

fn memory_store() -> AccessRecordStore<MemoryStorage, MemoryTree> {
    // Honors RUST_LOG for debugging test runs; idempotent across tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    AccessRecordStore::new(MemoryStorage::new(), small_tree())
}

fn topic(id: u64, category: u64, owner: u64, reply_mode: ReplyMode) -> TopicView {
    TopicView {
        id,
        category: Some(category),
        owner,
        published: true,
        reply_mode,
    }
}

fn reply(id: u64, topic: u64, owner: u64) -> ReplyView {
    ReplyView {
        id,
        topic,
        owner,
        published: true,
        parent: None,
    }
}

/// A typical policy: authenticated users get view + own-content control,
/// moderators get full control. Role lookup is per derived role, so the
/// moderator grants are spelled out rather than implied.
fn grant_standard_policy(record: &mut AccessRecord) {
    record
        .set_permissions(
            false,
            [
                (Role::Authenticated, ObjectKind::Category, Permission::View),
                (Role::Authenticated, ObjectKind::Topic, Permission::Create),
                (Role::Authenticated, ObjectKind::Topic, Permission::UpdateOwn),
                (Role::Authenticated, ObjectKind::Reply, Permission::Create),
                (Role::Authenticated, ObjectKind::Reply, Permission::UpdateOwn),
                (Role::Authenticated, ObjectKind::Reply, Permission::DeleteOwn),
                (Role::Moderator, ObjectKind::Category, Permission::View),
                (Role::Moderator, ObjectKind::Topic, Permission::Create),
                (Role::Moderator, ObjectKind::Topic, Permission::Update),
                (Role::Moderator, ObjectKind::Topic, Permission::Delete),
                (Role::Moderator, ObjectKind::Reply, Permission::Create),
                (Role::Moderator, ObjectKind::Reply, Permission::Update),
                (Role::Moderator, ObjectKind::Reply, Permission::Delete),
            ],
        )
        .expect("catalog-valid grants");
}

/// A overrides permissions, B inherits; both resolve to
/// A's set, and C (outside the subtree) keeps the root default.
#[test]
fn test_inheritance_resolution_scenario() {
    let store = memory_store();

    let mut a = AccessRecord::new(1);
    a.set_permissions(
        false,
        [(Role::Authenticated, ObjectKind::Topic, Permission::Create)],
    )
    .expect("valid grant");
    store.save(&a).expect("save A");

    let a_perms = store.effective_permissions(1).expect("resolve A");
    let b_perms = store.effective_permissions(2).expect("resolve B");
    assert_eq!(a_perms, b_perms);
    assert!(b_perms.allows(Role::Authenticated, ObjectKind::Topic, Permission::Create));

    let c_perms = store.effective_permissions(3).expect("resolve C");
    assert!(c_perms.is_empty());
}

/// Cascade completeness: flipping A from inheriting to overriding must
/// re-point every still-inheriting descendant at A's new set, and A must
/// no longer resolve to its former ancestor's set.
#[test]
fn test_cascade_completeness() {
    let store = memory_store();

    // Root carries a default permission set everything inherits at first.
    let mut root = AccessRecord::new(0);
    root.set_permissions(
        false,
        [(Role::Member, ObjectKind::Reply, Permission::Create)],
    )
    .expect("valid grant");
    store.save(&root).expect("save root");
    assert!(store
        .effective_permissions(1)
        .expect("resolve A")
        .allows(Role::Member, ObjectKind::Reply, Permission::Create));

    // A now overrides.
    let mut a = AccessRecord::new(1);
    a.set_permissions(
        false,
        [(Role::Authenticated, ObjectKind::Topic, Permission::Create)],
    )
    .expect("valid grant");
    let outcome = store.save(&a).expect("save A");
    assert!(outcome.affected.contains(&1));
    assert!(outcome.affected.contains(&2), "inheriting child is affected");

    let a_perms = store.effective_permissions(1).expect("resolve A");
    assert!(!a_perms.allows(Role::Member, ObjectKind::Reply, Permission::Create));
    assert_eq!(store.effective_permissions(2).expect("resolve B"), a_perms);

    // C never hung under A; it keeps the root set.
    assert!(store
        .effective_permissions(3)
        .expect("resolve C")
        .allows(Role::Member, ObjectKind::Reply, Permission::Create));
}

/// Reply mode closed, non-moderator owner holding update_own.
/// Edits are forbidden even though the ownership permission would match.
#[test]
fn test_closed_reply_mode_denies_owner_edit() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    store.save(&a).expect("save A");

    let mut content = MemoryContent::new();
    let t = topic(100, 1, 42, ReplyMode::Closed);
    content.insert_topic(t);
    let r = reply(200, 100, 42);
    content.insert_reply(r);

    let engine = AccessDecisionEngine::new(&store, &content);
    let owner = Actor::user(42);

    // The owner can still see the published reply.
    assert!(engine
        .check(&owner, AccessTarget::Reply(&r), Operation::View)
        .expect("view check")
        .is_allowed());

    // But closed mode blocks update and delete for non-moderators.
    for op in [Operation::Update, Operation::Delete] {
        let decision = engine
            .check(&owner, AccessTarget::Reply(&r), op)
            .expect("edit check");
        assert!(decision.is_forbidden(), "{op:?} must be forbidden");
    }

    // A moderator of the category is exempt from the mode gate.
    let mut with_moderator = store.load(1).expect("load A");
    with_moderator.set_moderators(false, [7]);
    store.save(&with_moderator).expect("save moderators");
    let decision = engine
        .check(&Actor::user(7), AccessTarget::Reply(&r), Operation::Update)
        .expect("moderator check");
    assert!(decision.is_allowed());
}

#[test]
fn test_hidden_reply_mode_restricts_view_to_moderators() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    a.set_moderators(false, [7]);
    store.save(&a).expect("save A");

    let mut content = MemoryContent::new();
    let t = topic(100, 1, 42, ReplyMode::Hidden);
    content.insert_topic(t);
    let r = reply(200, 100, 42);
    content.insert_reply(r);

    let engine = AccessDecisionEngine::new(&store, &content);
    assert!(engine
        .check(&Actor::user(42), AccessTarget::Reply(&r), Operation::View)
        .expect("owner view")
        .is_forbidden());
    assert!(engine
        .check(&Actor::user(7), AccessTarget::Reply(&r), Operation::View)
        .expect("moderator view")
        .is_allowed());
}

#[test]
fn test_reply_creation_parent_rules() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    store.save(&a).expect("save A");

    let mut content = MemoryContent::new();
    let t1 = topic(100, 1, 42, ReplyMode::Open);
    let t2 = topic(101, 1, 42, ReplyMode::Open);
    content.insert_topic(t1);
    content.insert_topic(t2);
    content.insert_reply(reply(200, 100, 42));
    content.insert_reply(reply(201, 101, 42));

    let engine = AccessDecisionEngine::new(&store, &content);
    let actor = Actor::user(9);

    // Top-level reply and same-topic nesting are allowed.
    assert!(engine
        .can_create_reply(&actor, &t1, None)
        .expect("create check")
        .is_allowed());
    assert!(engine
        .can_create_reply(&actor, &t1, Some(200))
        .expect("create check")
        .is_allowed());

    // A parent reply from a different topic fails closed.
    assert!(engine
        .can_create_reply(&actor, &t1, Some(201))
        .expect("create check")
        .is_forbidden());

    // A missing parent fails closed.
    assert!(engine
        .can_create_reply(&actor, &t1, Some(999))
        .expect("create check")
        .is_forbidden());
}

#[test]
fn test_closed_mode_blocks_reply_creation() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    a.set_moderators(false, [7]);
    store.save(&a).expect("save A");

    let mut content = MemoryContent::new();
    let t = topic(100, 1, 42, ReplyMode::Closed);
    content.insert_topic(t);

    let engine = AccessDecisionEngine::new(&store, &content);
    assert!(engine
        .can_create_reply(&Actor::user(9), &t, None)
        .expect("user create")
        .is_forbidden());
    assert!(engine
        .can_create_reply(&Actor::user(7), &t, None)
        .expect("moderator create")
        .is_allowed());
}

#[test]
fn test_topic_without_category_is_admin_only() {
    let store = memory_store();
    let content = MemoryContent::new();
    let engine = AccessDecisionEngine::new(&store, &content);

    let orphan = TopicView {
        id: 100,
        category: None,
        owner: 42,
        published: true,
        reply_mode: ReplyMode::Open,
    };

    for op in [Operation::View, Operation::Update, Operation::Delete] {
        assert!(engine
            .check(&Actor::user(42), AccessTarget::Topic(&orphan), op)
            .expect("owner check")
            .is_forbidden());
        assert!(engine
            .check(&Actor::admin(1), AccessTarget::Topic(&orphan), op)
            .expect("admin check")
            .is_allowed());
    }
}

/// Ownership permission: update_own (without update) grants topic edits
/// exactly on the actor's own topics.
#[test]
fn test_ownership_permission_matrix() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    store.save(&a).expect("save A");

    let content = MemoryContent::new();
    let engine = AccessDecisionEngine::new(&store, &content);
    let actor = Actor::user(42);

    let own = topic(100, 1, 42, ReplyMode::Open);
    let other = topic(101, 1, 50, ReplyMode::Open);

    assert!(engine
        .check(&actor, AccessTarget::Topic(&own), Operation::Update)
        .expect("own update")
        .is_allowed());
    assert!(engine
        .check(&actor, AccessTarget::Topic(&other), Operation::Update)
        .expect("other update")
        .is_forbidden());
}

#[test]
fn test_category_decisions_and_field_gates() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    a.set_moderators(false, [7]);
    store.save(&a).expect("save A");

    let content = MemoryContent::new();
    let engine = AccessDecisionEngine::new(&store, &content);
    let user = Actor::user(42);
    let moderator = Actor::user(7);
    let admin = Actor::admin(1);

    // Update requires moderator, delete requires admin.
    assert!(engine
        .check(&user, AccessTarget::Category(1), Operation::Update)
        .expect("user update")
        .is_forbidden());
    assert!(engine
        .check(&moderator, AccessTarget::Category(1), Operation::Update)
        .expect("moderator update")
        .is_allowed());
    assert!(engine
        .check(&moderator, AccessTarget::Category(1), Operation::Delete)
        .expect("moderator delete")
        .is_forbidden());
    assert!(engine
        .check(&admin, AccessTarget::Category(1), Operation::Delete)
        .expect("admin delete")
        .is_allowed());

    // Name/description editable by moderators; status never.
    assert!(engine
        .check_category_field(&moderator, 1, CategoryField::Name)
        .expect("name field")
        .is_allowed());
    assert!(engine
        .check_category_field(&user, 1, CategoryField::Description)
        .expect("description field")
        .is_forbidden());
    for actor in [&user, &moderator, &admin] {
        assert!(engine
            .check_category_field(actor, 1, CategoryField::Status)
            .expect("status field")
            .is_forbidden());
    }
}

#[test]
fn test_unmanaged_tree_nodes_get_neutral_decisions() {
    let mut tree = small_tree();
    tree.insert_unmanaged(50, 0);
    let store = AccessRecordStore::new(MemoryStorage::new(), tree);
    let content = MemoryContent::new();
    let engine = AccessDecisionEngine::new(&store, &content);

    let decision = engine
        .check(&Actor::user(42), AccessTarget::Category(50), Operation::View)
        .expect("unmanaged check");
    assert!(decision.is_neutral());
}

#[test]
fn test_save_fires_notification_and_refreshes_resolution() {
    let store = memory_store();
    let notified: Arc<Mutex<Vec<BTreeSet<u64>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    store.add_change_listener(Box::new(move |ids| {
        sink.lock().unwrap().push(ids.clone());
    }));

    // Warm the cache with the default resolution.
    assert!(store.effective_moderators(2).expect("resolve B").is_empty());

    let mut a = AccessRecord::new(1);
    a.set_moderators(false, [7, 8]);
    store.save(&a).expect("save A");

    // The write invalidated the memoized records on the cascade path.
    let moderators = store.effective_moderators(2).expect("resolve B again");
    assert_eq!(moderators, BTreeSet::from([7, 8]));

    let notified = notified.lock().unwrap();
    assert_eq!(notified.len(), 1);
    assert!(notified[0].contains(&1) && notified[0].contains(&2));
}

#[test]
fn test_rocksdb_backend_end_to_end() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("access_db");

    {
        let storage = RocksDbStorage::open_default(&db_path).expect("open db");
        let store = AccessRecordStore::new(storage, small_tree());
        let mut a = AccessRecord::new(1);
        grant_standard_policy(&mut a);
        a.set_moderators(false, [7]);
        store.save(&a).expect("save A");
    }

    // A fresh store over the same database sees the persisted policy.
    let storage = RocksDbStorage::open_default(&db_path).expect("reopen db");
    let store = AccessRecordStore::new(storage, small_tree());
    let content = MemoryContent::new();
    let engine = AccessDecisionEngine::new(&store, &content);

    assert!(engine
        .check(&Actor::user(42), AccessTarget::Category(1), Operation::View)
        .expect("view check")
        .is_allowed());
    assert_eq!(
        store.effective_moderators(2).expect("resolve B"),
        BTreeSet::from([7])
    );

    // Cascade rows were materialized for the inheriting child.
    let rows = store.storage().load_users(&[2]).expect("load rows");
    assert!(rows.contains_key(&2));
}

#[test]
fn test_decision_dependencies_name_resolution_sources() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    grant_standard_policy(&mut a);
    store.save(&a).expect("save A");

    let mut content = MemoryContent::new();
    let t = topic(100, 1, 42, ReplyMode::Open);
    content.insert_topic(t);
    let r = reply(200, 100, 42);
    content.insert_reply(r);

    let engine = AccessDecisionEngine::new(&store, &content);
    let decision = engine
        .check(&Actor::user(42), AccessTarget::Reply(&r), Operation::View)
        .expect("view check");

    use forum_acl::CacheDep;
    assert!(decision.deps().contains(&CacheDep::Reply(200)));
    assert!(decision.deps().contains(&CacheDep::Topic(100)));
    assert!(decision.deps().contains(&CacheDep::Category(1)));
}

#[test]
fn test_topic_creation_gate() {
    let store = memory_store();
    let mut a = AccessRecord::new(1);
    a.set_permissions(
        false,
        [(Role::Member, ObjectKind::Topic, Permission::Create)],
    )
    .expect("valid grant");
    a.set_members(false, [20]);
    store.save(&a).expect("save A");

    let content = MemoryContent::new();
    let engine = AccessDecisionEngine::new(&store, &content);

    assert!(engine
        .can_create_topic(&Actor::user(20), 1)
        .expect("member create")
        .is_allowed());
    assert!(engine
        .can_create_topic(&Actor::user(99), 1)
        .expect("non-member create")
        .is_forbidden());
    assert!(engine
        .can_create_topic(&Actor::anonymous(), 1)
        .expect("anonymous create")
        .is_forbidden());

    // The member grant also flows into the inheriting child category.
    assert!(engine
        .can_create_topic(&Actor::user(20), 2)
        .expect("member create in child")
        .is_allowed());
}
