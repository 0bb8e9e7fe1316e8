//! RocksDB-backed row storage.
//!
//! Column families give the three tables logical separation:
//! - `settings`: `{category_id}` -> serialized [`SettingsRow`]
//! - `users`: `{category_id}{role}{user_id}` -> serialized [`UserRow`]
//! - `permissions`: `{category_id}...` -> serialized [`PermissionRow`]
//!
//! Keys use big-endian fixed-width encoding so per-category (and, for user
//! rows, per-role) prefix scans and deletes are cheap. A [`RowBatch`] is
//! applied through a single `rocksdb::WriteBatch`, which is what makes the
//! all-or-nothing contract of [`AccessStorage::apply`] hold: either the
//! whole batch commits or none of it does.

use crate::error::{AccessError, Result};
use crate::storage::{
    AccessStorage, CategoryRole, PermissionRow, RowBatch, SettingsRow, UserRow,
};
use crate::CategoryId;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options, WriteBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Column family names.
const CF_SETTINGS: &str = "settings";
const CF_USERS: &str = "users";
const CF_PERMISSIONS: &str = "permissions";

const COLUMN_FAMILIES: &[&str] = &[CF_SETTINGS, CF_USERS, CF_PERMISSIONS];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the RocksDB backend.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of log files to keep.
    pub keep_log_file_num: usize,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            keep_log_file_num: 2,
            write_buffer_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl RocksDbConfig {
    /// Builds RocksDB Options from this configuration.
    pub fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

// =============================================================================
// Key Layouts
// =============================================================================

/// Settings key: category id (8 bytes, big-endian).
fn settings_key(category_id: CategoryId) -> [u8; 8] {
    category_id.to_be_bytes()
}

/// User row key: category (8) + role (1) + user id (8) = 17 bytes.
fn user_key(row: &UserRow) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(&row.category_id.to_be_bytes());
    key.push(row.role.as_u8());
    key.extend_from_slice(&row.user_id.to_be_bytes());
    key
}

/// Prefix covering one role's user rows within a category (9 bytes).
fn user_role_prefix(category_id: CategoryId, role: CategoryRole) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.extend_from_slice(&category_id.to_be_bytes());
    key.push(role.as_u8());
    key
}

/// Permission row key: category (8) + role (1) + kind (1) + permission (1).
fn permission_key(row: &PermissionRow) -> Vec<u8> {
    let mut key = Vec::with_capacity(11);
    key.extend_from_slice(&row.category_id.to_be_bytes());
    key.push(row.role as u8);
    key.push(row.kind as u8);
    key.push(row.permission as u8);
    key
}

/// Prefix covering every row of a category (8 bytes).
fn category_prefix(category_id: CategoryId) -> [u8; 8] {
    category_id.to_be_bytes()
}

// =============================================================================
// Database Handle
// =============================================================================

/// Thin wrapper around the RocksDB handle with serialized get/put and
/// prefix operations.
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbHandle {
    /// Opens the database with the backend's column families.
    pub fn open(db_path: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let opts = config.build_options();
        let cf_opts = Options::default();
        let cf_descriptors: Vec<_> = COLUMN_FAMILIES
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, cf_opts.clone()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            cf_descriptors,
        )
        .map_err(|e| AccessError::storage(format!("Failed to open RocksDB: {e}")))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| AccessError::storage(format!("Column family '{name}' not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key) {
            Ok(Some(bytes)) => {
                trace!(cf = cf_name, key_len = key.len(), "db_get: found record");
                let value: T = bincode::deserialize(&bytes)
                    .map_err(|e| AccessError::serialization(format!("Failed to deserialize: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AccessError::storage(format!("Failed to read: {e}"))),
        }
    }

    /// Collects deserialized values for every key with the given prefix.
    fn prefix_collect<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let iter = self.db.prefix_iterator_cf(&cf, prefix);
        let mut results = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| AccessError::storage(format!("Iterator error: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            let decoded = bincode::deserialize(&value)
                .map_err(|e| AccessError::serialization(format!("Failed to deserialize: {e}")))?;
            results.push(decoded);
        }
        Ok(results)
    }

    /// Collects the raw keys with the given prefix.
    fn prefix_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let iter = self.db.prefix_iterator_cf(&cf, prefix);
        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| AccessError::storage(format!("Iterator error: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn put_in_batch<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = bincode::serialize(value)
            .map_err(|e| AccessError::serialization(format!("Failed to serialize: {e}")))?;
        batch.put_cf(&cf, key, bytes);
        Ok(())
    }

    /// Commits a write batch. This is the backend's atomicity boundary.
    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| AccessError::storage(format!("Failed to commit batch: {e}")))
    }
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle").field("db", &"RocksDB").finish()
    }
}

// =============================================================================
// Storage Backend
// =============================================================================

/// Durable [`AccessStorage`] backend on RocksDB.
#[derive(Debug)]
pub struct RocksDbStorage {
    db: RocksDbHandle,
}

impl RocksDbStorage {
    /// Opens (or creates) the backend at the given path.
    pub fn open(db_path: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db = RocksDbHandle::open(db_path, config)?;
        debug!("Opened access-control RocksDB backend");
        Ok(Self { db })
    }

    /// Opens the backend with default configuration.
    pub fn open_default(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open(db_path, &RocksDbConfig::default())
    }

    /// Stages every delete and insert of a row batch onto a WriteBatch.
    fn stage(&self, batch: &RowBatch, out: &mut WriteBatch) -> Result<()> {
        for row in &batch.settings {
            self.db
                .put_in_batch(out, CF_SETTINGS, &settings_key(row.category_id), row)?;
        }
        for &(category_id, role) in &batch.delete_users {
            let cf = self.db.cf(CF_USERS)?;
            for key in self
                .db
                .prefix_keys(CF_USERS, &user_role_prefix(category_id, role))?
            {
                out.delete_cf(&cf, key);
            }
        }
        for row in &batch.insert_users {
            self.db.put_in_batch(out, CF_USERS, &user_key(row), row)?;
        }
        for &category_id in &batch.delete_permissions {
            let cf = self.db.cf(CF_PERMISSIONS)?;
            for key in self
                .db
                .prefix_keys(CF_PERMISSIONS, &category_prefix(category_id))?
            {
                out.delete_cf(&cf, key);
            }
        }
        for row in &batch.insert_permissions {
            self.db
                .put_in_batch(out, CF_PERMISSIONS, &permission_key(row), row)?;
        }
        Ok(())
    }
}

impl AccessStorage for RocksDbStorage {
    fn load_settings(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, SettingsRow>> {
        let mut rows = HashMap::with_capacity(ids.len());
        for &id in ids {
            if let Some(row) = self.db.get::<SettingsRow>(CF_SETTINGS, &settings_key(id))? {
                rows.insert(id, row);
            }
        }
        trace!(requested = ids.len(), found = rows.len(), "loaded settings rows");
        Ok(rows)
    }

    fn load_users(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, Vec<UserRow>>> {
        let mut rows = HashMap::new();
        for &id in ids {
            let found: Vec<UserRow> = self.db.prefix_collect(CF_USERS, &category_prefix(id))?;
            if !found.is_empty() {
                rows.insert(id, found);
            }
        }
        Ok(rows)
    }

    fn load_permissions(&self, ids: &[CategoryId]) -> Result<HashMap<CategoryId, Vec<PermissionRow>>> {
        let mut rows = HashMap::new();
        for &id in ids {
            let found: Vec<PermissionRow> =
                self.db.prefix_collect(CF_PERMISSIONS, &category_prefix(id))?;
            if !found.is_empty() {
                rows.insert(id, found);
            }
        }
        Ok(rows)
    }

    fn apply(&self, batch: RowBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut write_batch = WriteBatch::default();
        self.stage(&batch, &mut write_batch)?;
        self.db.write(write_batch)?;
        debug!(
            settings = batch.settings.len(),
            user_inserts = batch.insert_users.len(),
            permission_inserts = batch.insert_permissions.len(),
            "committed row batch"
        );
        Ok(())
    }

    fn delete_category(&self, id: CategoryId) -> Result<()> {
        let mut write_batch = WriteBatch::default();
        let settings_cf = self.db.cf(CF_SETTINGS)?;
        write_batch.delete_cf(&settings_cf, settings_key(id));
        let users_cf = self.db.cf(CF_USERS)?;
        for key in self.db.prefix_keys(CF_USERS, &category_prefix(id))? {
            write_batch.delete_cf(&users_cf, key);
        }
        let permissions_cf = self.db.cf(CF_PERMISSIONS)?;
        for key in self.db.prefix_keys(CF_PERMISSIONS, &category_prefix(id))? {
            write_batch.delete_cf(&permissions_cf, key);
        }
        self.db.write(write_batch)
    }
}
