//! # forum-acl: hierarchical access control for forum content
//!
//! An in-process authorization engine that decides, for every
//! (user, category, target object, operation) tuple, whether an action on
//! forum content is permitted.
//!
//! ## Features
//!
//! - **Tree-structured inheritance**: every category inherits its member
//!   list, moderator list, and permission matrix independently from its
//!   parent, down to a synthetic global-default root.
//! - **Typed policy catalog**: permission matrices are validated once
//!   against a static catalog; unknown grants are rejected at the edge.
//! - **Ownership-aware permissions**: `update_own`/`delete_own` grants
//!   apply only to content the acting user authored.
//! - **Diffed, cascading writes**: saving a record writes only the facets
//!   that changed, materializes the new values across every inheriting
//!   descendant in one atomic batch, and fires a change notification with
//!   the affected category ids for cache invalidation.
//! - **Three-valued decisions**: checks return `Allowed`/`Neutral`/
//!   `Forbidden` with accumulated cache dependencies, composable with
//!   AND/OR combinators.
//!
//! ## Example
//!
//! ```rust
//! use forum_acl::{
//!     AccessDecisionEngine, AccessRecord, AccessRecordStore, AccessTarget, Actor,
//!     MemoryContent, MemoryStorage, MemoryTree, ObjectKind, Operation, Permission, Role,
//! };
//!
//! # fn main() -> forum_acl::Result<()> {
//! let mut tree = MemoryTree::new();
//! tree.insert(1, 0); // one category under the global-default root
//!
//! let store = AccessRecordStore::new(MemoryStorage::new(), tree);
//! let mut record = AccessRecord::new(1);
//! record.set_permissions(
//!     false,
//!     [
//!         (Role::Authenticated, ObjectKind::Category, Permission::View),
//!         (Role::Authenticated, ObjectKind::Topic, Permission::Create),
//!     ],
//! )?;
//! store.save(&record)?;
//!
//! let content = MemoryContent::new();
//! let engine = AccessDecisionEngine::new(&store, &content);
//! let decision = engine.check(&Actor::user(42), AccessTarget::Category(1), Operation::View)?;
//! assert!(decision.is_allowed());
//!
//! let anonymous = engine.check(&Actor::anonymous(), AccessTarget::Category(1), Operation::View)?;
//! assert!(anonymous.is_forbidden());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod constants;
pub mod content;
pub mod decision;
pub mod engine;
pub mod error;
pub mod record;
pub mod storage;
pub mod store;
pub mod tree;

pub use catalog::{ObjectKind, Permission, Role};
pub use content::{Actor, ContentIndex, MemoryContent, ReplyMode, ReplyView, TopicView};
pub use decision::{CacheDep, Decision, Verdict};
pub use engine::{AccessDecisionEngine, AccessTarget, CategoryField, Operation};
pub use error::{AccessError, Result};
pub use record::{AccessRecord, ChangedFacets, Facet, PermissionMatrix, ResolvedAccess};
pub use storage::rocksdb::{RocksDbConfig, RocksDbStorage};
pub use storage::{
    AccessStorage, CategoryRole, MemoryStorage, PermissionRow, RowBatch, SettingsRow, UserRow,
};
pub use store::{AccessRecordStore, SaveOutcome};
pub use tree::{CategoryTree, MemoryTree};

/// Category id. Id `0` is the synthetic global-default root.
pub type CategoryId = u64;

/// User id. Id `0` is the anonymous user.
pub type UserId = u64;

/// Topic id.
pub type TopicId = u64;

/// Reply id.
pub type ReplyId = u64;
