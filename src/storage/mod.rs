//! Row-level persistence for access records.
//!
//! Three tables back the engine:
//! - settings: the three inherit flags, keyed by category id
//! - users: `(category, user, role)` rows, role in {member, moderator}
//! - permissions: `(category, role, kind, permission)` rows
//!
//! [`AccessStorage`] is the narrow interface the record store drives.
//! Reads are batched (one call per table for any number of categories);
//! writes go through a [`RowBatch`] that the backend applies atomically:
//! either every delete and insert lands, or none do.
//!
//! Backends: [`MemoryStorage`] here (request-scoped, test-friendly) and
//! [`RocksDbStorage`](self::rocksdb::RocksDbStorage) for durable storage.

pub mod rocksdb;

use crate::catalog::{ObjectKind, Permission, Role};
use crate::error::{AccessError, Result};
use crate::{CategoryId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// The role column of a category-user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CategoryRole {
    /// Listed in the category's member set.
    Member = 1,
    /// Listed in the category's moderator set.
    Moderator = 2,
}

impl CategoryRole {
    /// Storage discriminant.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Parses the storage discriminant.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(CategoryRole::Member),
            2 => Some(CategoryRole::Moderator),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryRole::Member => write!(f, "member"),
            CategoryRole::Moderator => write!(f, "moderator"),
        }
    }
}

/// Settings row: the three inherit flags of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRow {
    /// Category id.
    pub category_id: CategoryId,
    /// Inherit flag for the members facet.
    pub inherit_members: bool,
    /// Inherit flag for the moderators facet.
    pub inherit_moderators: bool,
    /// Inherit flag for the permissions facet.
    pub inherit_permissions: bool,
}

/// Category-user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserRow {
    /// Category id.
    pub category_id: CategoryId,
    /// User id.
    pub user_id: UserId,
    /// Member or moderator.
    pub role: CategoryRole,
}

/// Category-permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionRow {
    /// Category id.
    pub category_id: CategoryId,
    /// Role the permission is granted to.
    pub role: Role,
    /// Object kind the permission applies to.
    pub kind: ObjectKind,
    /// The granted permission.
    pub permission: Permission,
}

/// An all-or-nothing write set.
///
/// Deletes are applied before inserts, so a batch can atomically replace
/// a facet's rows across a whole cascade set.
#[derive(Debug, Clone, Default)]
pub struct RowBatch {
    /// Settings rows to upsert.
    pub settings: Vec<SettingsRow>,
    /// `(category, role)` pairs whose user rows are deleted.
    pub delete_users: Vec<(CategoryId, CategoryRole)>,
    /// User rows to insert.
    pub insert_users: Vec<UserRow>,
    /// Categories whose permission rows are deleted.
    pub delete_permissions: Vec<CategoryId>,
    /// Permission rows to insert.
    pub insert_permissions: Vec<PermissionRow>,
}

impl RowBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the batch contains no work.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
            && self.delete_users.is_empty()
            && self.insert_users.is_empty()
            && self.delete_permissions.is_empty()
            && self.insert_permissions.is_empty()
    }
}

/// Row-level storage the record store reads and writes through.
pub trait AccessStorage {
    /// Loads settings rows for the given categories. Categories without a
    /// row are absent from the result.
    fn load_settings(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, SettingsRow>>;

    /// Loads user rows (both roles) for the given categories.
    fn load_users(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, Vec<UserRow>>>;

    /// Loads permission rows for the given categories.
    fn load_permissions(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, Vec<PermissionRow>>>;

    /// Applies a write batch atomically. On error nothing is visible.
    fn apply(&self, batch: RowBatch) -> Result<()>;

    /// Deletes every row of a category (settings, users, permissions).
    /// Called when the category itself is deleted; descendants keep their
    /// own rows and resolve against the next surviving ancestor.
    fn delete_category(&self, id: CategoryId) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryTables {
    settings: HashMap<CategoryId, SettingsRow>,
    users: HashMap<CategoryId, BTreeSet<(CategoryRole, UserId)>>,
    permissions: HashMap<CategoryId, BTreeSet<(Role, ObjectKind, Permission)>>,
}

/// In-memory storage backend.
///
/// Atomicity falls out of the single write lock: a batch mutates the
/// tables in one critical section or, when poisoned via
/// [`fail_next_apply`](Self::fail_next_apply), not at all.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<MemoryTables>,
    fail_next_apply: AtomicBool,
}

impl MemoryStorage {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `apply` fail with a storage error without touching
    /// the tables. Test hook for exercising rollback paths.
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// Total number of user rows, across all categories.
    pub fn user_row_count(&self) -> usize {
        self.tables
            .read()
            .map(|tables| tables.users.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }

    /// Total number of permission rows, across all categories.
    pub fn permission_row_count(&self) -> usize {
        self.tables
            .read()
            .map(|tables| tables.permissions.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }
}

impl AccessStorage for MemoryStorage {
    fn load_settings(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, SettingsRow>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| AccessError::storage("storage lock poisoned"))?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.settings.get(id).map(|row| (*id, *row)))
            .collect())
    }

    fn load_users(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, Vec<UserRow>>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| AccessError::storage("storage lock poisoned"))?;
        Ok(ids
            .iter()
            .filter_map(|&id| {
                tables.users.get(&id).map(|rows| {
                    let rows = rows
                        .iter()
                        .map(|&(role, user_id)| UserRow {
                            category_id: id,
                            user_id,
                            role,
                        })
                        .collect();
                    (id, rows)
                })
            })
            .collect())
    }

    fn load_permissions(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, Vec<PermissionRow>>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| AccessError::storage("storage lock poisoned"))?;
        Ok(ids
            .iter()
            .filter_map(|&id| {
                tables.permissions.get(&id).map(|rows| {
                    let rows = rows
                        .iter()
                        .map(|&(role, kind, permission)| PermissionRow {
                            category_id: id,
                            role,
                            kind,
                            permission,
                        })
                        .collect();
                    (id, rows)
                })
            })
            .collect())
    }

    fn apply(&self, batch: RowBatch) -> Result<()> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(AccessError::storage("injected apply failure"));
        }
        let mut tables = self
            .tables
            .write()
            .map_err(|_| AccessError::storage("storage lock poisoned"))?;

        for row in &batch.settings {
            tables.settings.insert(row.category_id, *row);
        }
        for &(category_id, role) in &batch.delete_users {
            if let Some(rows) = tables.users.get_mut(&category_id) {
                rows.retain(|&(r, _)| r != role);
            }
        }
        for row in &batch.insert_users {
            tables
                .users
                .entry(row.category_id)
                .or_default()
                .insert((row.role, row.user_id));
        }
        for category_id in &batch.delete_permissions {
            tables.permissions.remove(category_id);
        }
        for row in &batch.insert_permissions {
            tables
                .permissions
                .entry(row.category_id)
                .or_default()
                .insert((row.role, row.kind, row.permission));
        }
        Ok(())
    }

    fn delete_category(&self, id: CategoryId) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| AccessError::storage("storage lock poisoned"))?;
        tables.settings.remove(&id);
        tables.users.remove(&id);
        tables.permissions.remove(&id);
        Ok(())
    }
}
