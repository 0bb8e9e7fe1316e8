//! The access-record store: resolution, persistence, and cache control.
//!
//! `AccessRecordStore` is the only component that reads or writes persisted
//! access records. It owns:
//!
//! - a request-scoped memo cache of raw records, keyed by category id,
//!   invalidated explicitly after writes, never silently stale within one
//!   resolution pass;
//! - inheritance resolution: per-facet walks up the parent chain to the
//!   first non-inheriting ancestor (the synthetic root terminates every
//!   chain);
//! - cascade computation on write: the set of descendant ids whose
//!   resolved facet value depends on the saved record's raw value;
//! - the change-notification hook fired with the affected id set after
//!   every successful save.
//!
//! All tree walks are cycle-guarded and depth-bounded; a violation is a
//! fatal [`DataIntegrity`](crate::AccessError::DataIntegrity) error, never
//! an infinite loop.

use crate::constants::{MAX_TREE_DEPTH, ROOT_CATEGORY};
use crate::error::{AccessError, Result};
use crate::record::{AccessRecord, ChangedFacets, Facet, PermissionMatrix, ResolvedAccess};
use crate::storage::{
    AccessStorage, CategoryRole, PermissionRow, RowBatch, SettingsRow, UserRow,
};
use crate::tree::CategoryTree;
use crate::{CategoryId, UserId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Listener invoked with the affected category ids after a successful save.
pub type ChangeListener = Box<dyn Fn(&BTreeSet<CategoryId>) + Send + Sync>;

/// Result of a save: what changed and which categories were affected.
#[derive(Debug, Clone, Default)]
pub struct SaveOutcome {
    /// Per-facet change bits that drove the write.
    pub changed: ChangedFacets,
    /// Every category id whose resolved state the write touched (the
    /// union of all three facet cascades). Empty for a no-op save.
    pub affected: BTreeSet<CategoryId>,
}

impl SaveOutcome {
    /// Returns true if the save performed no writes.
    pub fn is_noop(&self) -> bool {
        self.affected.is_empty()
    }
}

/// Resolves, persists, and caches access records.
pub struct AccessRecordStore<S, T> {
    storage: S,
    tree: T,
    cache: RwLock<HashMap<CategoryId, AccessRecord>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl<S: AccessStorage, T: CategoryTree> AccessRecordStore<S, T> {
    /// Creates a store over the given backend and tree.
    pub fn new(storage: S, tree: T) -> Self {
        Self {
            storage,
            tree,
            cache: RwLock::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The underlying row storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The underlying category tree.
    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Registers a change listener, fired with the affected id set after
    /// every save that changed anything.
    pub fn add_change_listener(&self, listener: ChangeListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads the raw record of a category.
    ///
    /// Memoized per store lifetime. A category with no persisted rows gets
    /// the default record (fully inheriting, empty raw state); a policy
    /// lookup never fails just because nothing has been configured yet.
    pub fn load(&self, id: CategoryId) -> Result<AccessRecord> {
        if let Ok(cache) = self.cache.read() {
            if let Some(record) = cache.get(&id) {
                return Ok(record.clone());
            }
        }
        let mut loaded = self.load_many(&[id])?;
        loaded
            .remove(&id)
            .ok_or_else(|| AccessError::storage("batch load dropped a requested category"))
    }

    /// Loads the raw record of a category, failing with
    /// [`RecordNotAvailable`](AccessError::RecordNotAvailable) if the
    /// category has never been persisted instead of synthesizing a
    /// default.
    pub fn load_existing(&self, id: CategoryId) -> Result<AccessRecord> {
        let settings = self.storage.load_settings(&[id])?;
        if !settings.contains_key(&id) {
            return Err(AccessError::record_not_available(format!(
                "category {id} has no persisted access record"
            )));
        }
        self.load(id)
    }

    /// Batch form of [`load`](Self::load).
    ///
    /// Performs at most three storage reads regardless of how many ids are
    /// requested: one settings read for all uncached ids, then one users
    /// read and one permissions read keyed by exactly the ids whose flags
    /// require that facet.
    pub fn load_many(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, AccessRecord>> {
        let mut records = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        if let Ok(cache) = self.cache.read() {
            for &id in ids {
                match cache.get(&id) {
                    Some(record) => {
                        records.insert(id, record.clone());
                    }
                    None => missing.push(id),
                }
            }
        } else {
            missing.extend_from_slice(ids);
        }
        if missing.is_empty() {
            return Ok(records);
        }

        let fetched = self.fetch_uncached(&missing)?;
        if let Ok(mut cache) = self.cache.write() {
            for (id, record) in &fetched {
                cache.insert(*id, record.clone());
            }
        }
        records.extend(fetched);
        Ok(records)
    }

    /// Loads records straight from storage, bypassing and not populating
    /// the cache. Returns each record plus whether a settings row existed.
    fn load_persisted(&self, id: CategoryId) -> Result<(AccessRecord, bool)> {
        let settings = self.storage.load_settings(&[id])?;
        let persisted = settings.contains_key(&id);
        let mut fetched = self.build_records(&[id], settings)?;
        let record = fetched
            .remove(&id)
            .ok_or_else(|| AccessError::storage("batch load dropped a requested category"))?;
        Ok((record, persisted))
    }

    fn fetch_uncached(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, AccessRecord>> {
        let settings = self.storage.load_settings(ids)?;
        self.build_records(ids, settings)
    }

    /// Assembles records from a settings batch, reading user and
    /// permission rows only for the ids whose flags make them meaningful.
    fn build_records(
        &self,
        ids: &[CategoryId],
        settings: HashMap<CategoryId, SettingsRow>,
    ) -> Result<HashMap<CategoryId, AccessRecord>> {
        let users_needed: Vec<CategoryId> = ids
            .iter()
            .copied()
            .filter(|id| {
                settings
                    .get(id)
                    .map(|s| !s.inherit_members || !s.inherit_moderators)
                    .unwrap_or(false)
            })
            .collect();
        let permissions_needed: Vec<CategoryId> = ids
            .iter()
            .copied()
            .filter(|id| {
                settings
                    .get(id)
                    .map(|s| !s.inherit_permissions)
                    .unwrap_or(false)
            })
            .collect();

        let mut user_rows = if users_needed.is_empty() {
            HashMap::new()
        } else {
            self.storage.load_users(&users_needed)?
        };
        let mut permission_rows = if permissions_needed.is_empty() {
            HashMap::new()
        } else {
            self.storage.load_permissions(&permissions_needed)?
        };

        let mut records = HashMap::with_capacity(ids.len());
        for &id in ids {
            let mut record = AccessRecord::new(id);
            if let Some(row) = settings.get(&id) {
                let users = user_rows.remove(&id).unwrap_or_default();
                if !row.inherit_members {
                    record.set_members(false, facet_user_ids(&users, CategoryRole::Member));
                }
                if !row.inherit_moderators {
                    record.set_moderators(false, facet_user_ids(&users, CategoryRole::Moderator));
                }
                if !row.inherit_permissions {
                    let rows = permission_rows.remove(&id).unwrap_or_default();
                    let matrix = PermissionMatrix::from_grants(
                        rows.iter().map(|r| (r.role, r.kind, r.permission)),
                    )
                    .map_err(|e| {
                        AccessError::data_integrity(format!(
                            "stored permission rows for category {id} fail catalog validation: {e}"
                        ))
                    })?;
                    record.set_permission_matrix(false, matrix);
                }
            }
            records.insert(id, record);
        }
        Ok(records)
    }

    // =========================================================================
    // Inheritance Resolution
    // =========================================================================

    /// The parent of a category. The root has no parent and is never
    /// queried further.
    pub fn resolve_parent(&self, id: CategoryId) -> Result<Option<CategoryId>> {
        if id == ROOT_CATEGORY {
            return Ok(None);
        }
        self.tree.parent_of(id)
    }

    /// Walks the inheritance chain of one facet: the returned ids start at
    /// the category itself and end at the first non-inheriting ancestor
    /// (at the latest, the root).
    fn facet_chain(&self, id: CategoryId, facet: Facet) -> Result<Vec<CategoryId>> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::new();
        let mut current = id;
        loop {
            if !visited.insert(current) {
                return Err(AccessError::data_integrity(format!(
                    "cycle detected at category {current} while resolving {facet}"
                )));
            }
            if chain.len() >= MAX_TREE_DEPTH {
                return Err(AccessError::data_integrity(format!(
                    "inheritance chain of category {id} exceeds maximum depth"
                )));
            }
            chain.push(current);
            let record = self.load(current)?;
            if !record.inherits(facet) {
                return Ok(chain);
            }
            current = self.resolve_parent(current)?.unwrap_or(ROOT_CATEGORY);
        }
    }

    /// The effective member set of a category.
    pub fn effective_members(&self, id: CategoryId) -> Result<BTreeSet<UserId>> {
        let chain = self.facet_chain(id, Facet::Members)?;
        let source = *chain.last().unwrap_or(&id);
        Ok(self.load(source)?.members().clone())
    }

    /// The effective moderator set of a category.
    pub fn effective_moderators(&self, id: CategoryId) -> Result<BTreeSet<UserId>> {
        let chain = self.facet_chain(id, Facet::Moderators)?;
        let source = *chain.last().unwrap_or(&id);
        Ok(self.load(source)?.moderators().clone())
    }

    /// The effective permission matrix of a category.
    pub fn effective_permissions(&self, id: CategoryId) -> Result<PermissionMatrix> {
        let chain = self.facet_chain(id, Facet::Permissions)?;
        let source = *chain.last().unwrap_or(&id);
        Ok(self.load(source)?.permissions().clone())
    }

    /// Resolves the full effective policy of a category: all three facets
    /// plus the set of category ids the resolution consulted.
    pub fn resolve(&self, id: CategoryId) -> Result<ResolvedAccess> {
        let member_chain = self.facet_chain(id, Facet::Members)?;
        let moderator_chain = self.facet_chain(id, Facet::Moderators)?;
        let permission_chain = self.facet_chain(id, Facet::Permissions)?;

        let mut sources = BTreeSet::new();
        sources.extend(member_chain.iter().copied());
        sources.extend(moderator_chain.iter().copied());
        sources.extend(permission_chain.iter().copied());

        let members = self
            .load(*member_chain.last().unwrap_or(&id))?
            .members()
            .clone();
        let moderators = self
            .load(*moderator_chain.last().unwrap_or(&id))?
            .moderators()
            .clone();
        let permissions = self
            .load(*permission_chain.last().unwrap_or(&id))?
            .permissions()
            .clone();

        Ok(ResolvedAccess::new(
            id, members, moderators, permissions, sources,
        ))
    }

    // =========================================================================
    // Cascade Computation
    // =========================================================================

    /// Computes the cascade set of a facet: the seed ids plus every
    /// descendant whose own inherit flag for the facet is true,
    /// recursively.
    ///
    /// Breadth-first over direct children; a child encountered twice means
    /// the tree invariant is violated upstream and the walk fails rather
    /// than looping.
    pub fn ids_affected_by_inheritance(
        &self,
        seeds: &[CategoryId],
        facet: Facet,
    ) -> Result<BTreeSet<CategoryId>> {
        let mut affected: BTreeSet<CategoryId> = seeds.iter().copied().collect();
        let mut seen = affected.clone();
        let mut frontier: Vec<CategoryId> = seeds.to_vec();
        let mut depth = 0;

        while !frontier.is_empty() {
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                return Err(AccessError::data_integrity(
                    "cascade walk exceeds maximum tree depth",
                ));
            }
            let mut children = Vec::new();
            for &id in &frontier {
                for child in self.tree.children_of(id)? {
                    if !seen.insert(child) {
                        return Err(AccessError::data_integrity(format!(
                            "cycle detected at category {child} during cascade walk"
                        )));
                    }
                    children.push(child);
                }
            }
            if children.is_empty() {
                break;
            }
            let records = self.load_many(&children)?;
            frontier = children
                .into_iter()
                .filter(|child| {
                    records
                        .get(child)
                        .map(|record| record.inherits(facet))
                        .unwrap_or(true)
                })
                .collect();
            affected.extend(frontier.iter().copied());
        }
        Ok(affected)
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Persists a record.
    ///
    /// Each facet is skipped when unchanged against the last-persisted
    /// snapshot; changed facets have their rows deleted across the whole
    /// cascade set and, for non-inheriting facets, re-inserted with the
    /// record's raw value (the written value is the same for the whole
    /// cascade, which is what inheriting means). All writes land in one
    /// atomic batch. On success the affected ids are invalidated in the
    /// memo cache and handed to the change listeners.
    ///
    /// On failure nothing is persisted, but the in-memory record is not
    /// rolled back either; reload before retrying.
    pub fn save(&self, record: &AccessRecord) -> Result<SaveOutcome> {
        let id = record.category_id();
        let (previous, persisted) = self.load_persisted(id)?;
        let changed = record.changed_facets(&previous, persisted);
        if !changed.any() {
            debug!(category = id, "save skipped: record unchanged");
            return Ok(SaveOutcome::default());
        }

        let mut batch = RowBatch::new();
        if changed.settings {
            batch.settings.push(SettingsRow {
                category_id: id,
                inherit_members: record.inherit_members(),
                inherit_moderators: record.inherit_moderators(),
                inherit_permissions: record.inherit_permissions(),
            });
        }

        let mut affected = BTreeSet::new();
        for facet in Facet::USER_FACETS {
            if !changed.facet(facet) {
                continue;
            }
            let role = match facet {
                Facet::Members => CategoryRole::Member,
                Facet::Moderators => CategoryRole::Moderator,
                Facet::Permissions => continue,
            };
            let cascade = self.ids_affected_by_inheritance(&[id], facet)?;
            for &category_id in &cascade {
                batch.delete_users.push((category_id, role));
            }
            if !record.inherits(facet) {
                if let Some(users) = record.users(facet) {
                    for &category_id in &cascade {
                        for &user_id in users {
                            batch.insert_users.push(UserRow {
                                category_id,
                                user_id,
                                role,
                            });
                        }
                    }
                }
            }
            affected.extend(cascade);
        }

        if changed.permissions {
            let cascade = self.ids_affected_by_inheritance(&[id], Facet::Permissions)?;
            for &category_id in &cascade {
                batch.delete_permissions.push(category_id);
            }
            if !record.inherit_permissions() {
                for (role, kind, permission) in record.permissions().iter() {
                    for &category_id in &cascade {
                        batch.insert_permissions.push(PermissionRow {
                            category_id,
                            role,
                            kind,
                            permission,
                        });
                    }
                }
            }
            affected.extend(cascade);
        }

        if let Err(e) = self.storage.apply(batch) {
            warn!(category = id, error = %e, "access record save failed, batch rolled back");
            return Err(e);
        }

        self.invalidate(affected.iter().copied());
        self.notify(&affected);
        info!(
            category = id,
            affected = affected.len(),
            "saved access record"
        );
        Ok(SaveOutcome { changed, affected })
    }

    /// Deletes a category's rows. Descendants keep resolving against the
    /// next surviving ancestor.
    pub fn delete_category(&self, id: CategoryId) -> Result<()> {
        self.storage.delete_category(id)?;
        let affected = BTreeSet::from([id]);
        self.invalidate(affected.iter().copied());
        self.notify(&affected);
        Ok(())
    }

    // =========================================================================
    // Cache Control
    // =========================================================================

    /// Drops the given ids from the memo cache.
    pub fn invalidate(&self, ids: impl IntoIterator<Item = CategoryId>) {
        if let Ok(mut cache) = self.cache.write() {
            for id in ids {
                cache.remove(&id);
            }
        }
    }

    /// Drops the whole memo cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    fn notify(&self, affected: &BTreeSet<CategoryId>) {
        if affected.is_empty() {
            return;
        }
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(affected);
            }
        }
    }
}

fn facet_user_ids(rows: &[UserRow], role: CategoryRole) -> Vec<UserId> {
    rows.iter()
        .filter(|row| row.role == role)
        .map(|row| row.user_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ObjectKind, Permission, Role};
    use crate::storage::MemoryStorage;
    use crate::tree::MemoryTree;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn store_with(
        tree: MemoryTree,
    ) -> AccessRecordStore<MemoryStorage, MemoryTree> {
        AccessRecordStore::new(MemoryStorage::new(), tree)
    }

    /// root(0) -> A(1) -> B(2), plus C(3) under root.
    fn small_tree() -> MemoryTree {
        let mut tree = MemoryTree::new();
        tree.insert(1, ROOT_CATEGORY);
        tree.insert(2, 1);
        tree.insert(3, ROOT_CATEGORY);
        tree
    }

    fn topic_create_grant() -> (Role, ObjectKind, Permission) {
        (Role::Authenticated, ObjectKind::Topic, Permission::Create)
    }

    #[test]
    fn test_load_synthesizes_default_record() {
        let store = store_with(small_tree());
        let record = store.load(42).unwrap();
        assert_eq!(record.category_id(), 42);
        assert!(record.inherit_permissions());
    }

    #[test]
    fn test_load_existing_requires_persisted_row() {
        let store = store_with(small_tree());
        assert!(matches!(
            store.load_existing(1),
            Err(AccessError::RecordNotAvailable(_))
        ));

        let record = AccessRecord::new(1);
        store.save(&record).unwrap();
        assert!(store.load_existing(1).is_ok());
    }

    #[test]
    fn test_effective_permissions_inherit_chain() {
        let store = store_with(small_tree());

        let mut a = AccessRecord::new(1);
        a.set_permissions(false, [topic_create_grant()]).unwrap();
        store.save(&a).unwrap();

        // B inherits from A; A overrides; both resolve to A's set.
        let b_perms = store.effective_permissions(2).unwrap();
        let a_perms = store.effective_permissions(1).unwrap();
        assert_eq!(b_perms, a_perms);
        assert!(b_perms.allows(Role::Authenticated, ObjectKind::Topic, Permission::Create));

        // C still resolves to the (empty) root default.
        assert!(store.effective_permissions(3).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_reports_sources() {
        let store = store_with(small_tree());
        let resolved = store.resolve(2).unwrap();
        // Fully-inheriting B walks B -> A -> root for each facet.
        assert_eq!(
            resolved.sources().iter().copied().collect::<Vec<_>>(),
            vec![ROOT_CATEGORY, 1, 2]
        );
    }

    #[test]
    fn test_first_save_writes_all_facets() {
        let store = store_with(small_tree());
        let outcome = store.save(&AccessRecord::new(1)).unwrap();
        assert!(outcome.changed.settings);
        assert!(outcome.changed.members);
        assert!(outcome.changed.moderators);
        assert!(outcome.changed.permissions);
        assert!(outcome.affected.contains(&1));
    }

    #[test]
    fn test_noop_save_is_idempotent() {
        let store = store_with(small_tree());
        let mut record = AccessRecord::new(1);
        record.set_members(false, [5, 6]);
        store.save(&record).unwrap();
        let rows_before = store.storage().user_row_count();

        let outcome = store.save(&record).unwrap();
        assert!(outcome.is_noop());
        assert!(!outcome.changed.any());
        assert_eq!(store.storage().user_row_count(), rows_before);
    }

    #[test]
    fn test_cascade_materializes_rows_for_inheriting_descendants() {
        let store = store_with(small_tree());
        let mut a = AccessRecord::new(1);
        a.set_members(false, [7]);
        let outcome = store.save(&a).unwrap();

        // B inherits members, so it is part of A's cascade; C is not.
        assert!(outcome.affected.contains(&1));
        assert!(outcome.affected.contains(&2));
        assert!(!outcome.affected.contains(&3));

        let rows = store.storage().load_users(&[1, 2, 3]).unwrap();
        assert!(rows.contains_key(&1));
        assert!(rows.contains_key(&2));
        assert!(!rows.contains_key(&3));
    }

    #[test]
    fn test_cascade_stops_at_overriding_descendant() {
        let mut tree = small_tree();
        tree.insert(4, 2); // root -> A(1) -> B(2) -> D(4)
        let store = store_with(tree);

        // B overrides members; D inherits.
        let mut b = AccessRecord::new(2);
        b.set_members(false, [9]);
        store.save(&b).unwrap();

        // A's members cascade must stop at B (and so exclude D).
        let cascade = store
            .ids_affected_by_inheritance(&[1], Facet::Members)
            .unwrap();
        assert_eq!(cascade, BTreeSet::from([1]));

        // But A's moderators cascade flows through B into D.
        let cascade = store
            .ids_affected_by_inheritance(&[1], Facet::Moderators)
            .unwrap();
        assert_eq!(cascade, BTreeSet::from([1, 2, 4]));
    }

    #[test]
    fn test_change_listener_receives_affected_set() {
        let store = store_with(small_tree());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store.add_change_listener(Box::new(move |ids| {
            seen_clone.lock().unwrap().push(ids.clone());
        }));

        let mut a = AccessRecord::new(1);
        a.set_moderators(false, [10]);
        store.save(&a).unwrap();

        // No-op saves fire nothing.
        store.save(&a).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(&1));
        assert!(seen[0].contains(&2));
    }

    #[test]
    fn test_save_failure_leaves_rows_untouched() {
        let store = store_with(small_tree());
        let mut a = AccessRecord::new(1);
        a.set_members(false, [7]);
        store.save(&a).unwrap();

        let mut changed = a.clone();
        changed.set_members(false, [7, 8]);
        store.storage().fail_next_apply();
        assert!(matches!(
            store.save(&changed),
            Err(AccessError::Storage(_))
        ));

        // The persisted state is the pre-failure one.
        store.clear_cache();
        assert_eq!(
            store.effective_members(1).unwrap(),
            BTreeSet::from([7])
        );
    }

    #[test]
    fn test_resolution_cycle_is_fatal() {
        let mut tree = MemoryTree::new();
        tree.insert(1, 2);
        tree.insert(2, 1);
        let store = store_with(tree);
        assert!(matches!(
            store.effective_members(1),
            Err(AccessError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_cascade_cycle_is_fatal() {
        // Mutually-parented categories corrupt both link directions.
        let mut tree = MemoryTree::new();
        tree.insert(1, 2);
        tree.insert(2, 1);
        let store = store_with(tree);
        assert!(matches!(
            store.ids_affected_by_inheritance(&[1], Facet::Members),
            Err(AccessError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_cache_serves_repeat_loads() {
        let store = store_with(small_tree());
        let first = store.load(1).unwrap();
        let second = store.load(1).unwrap();
        assert_eq!(first, second);

        // After invalidation the record is rebuilt from storage.
        store.invalidate([1]);
        let third = store.load(1).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn test_load_many_returns_every_requested_id() {
        let store = store_with(small_tree());
        let records = store.load_many(&[1, 2, 42]).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.contains_key(&42));
    }

    #[test]
    fn test_delete_category_drops_rows_and_notifies() {
        let store = store_with(small_tree());
        let mut a = AccessRecord::new(1);
        a.set_members(false, [7]);
        store.save(&a).unwrap();

        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = Arc::clone(&notified);
        store.add_change_listener(Box::new(move |_| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        }));

        store.delete_category(1).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(store.storage().load_settings(&[1]).unwrap().is_empty());

        // The child keeps resolving; with A's rows gone it reaches the
        // root default again.
        assert!(store.effective_members(2).unwrap().is_empty());
    }
}
