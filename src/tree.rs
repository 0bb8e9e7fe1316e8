//! Category tree lookups.
//!
//! The category hierarchy is owned by the content layer; the engine only
//! needs parent-of and children-of queries plus a way to tell managed
//! forum categories apart from unrelated tree nodes sharing the same
//! storage. [`MemoryTree`] is the in-memory implementation used by tests,
//! demos, and request-scoped snapshots.

use crate::constants::ROOT_CATEGORY;
use crate::error::Result;
use crate::CategoryId;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Parent/child lookups over the category hierarchy.
///
/// All three per-facet cascade walks of a single `save` query the same
/// handle; implementations must answer them from one consistent snapshot
/// of the tree.
pub trait CategoryTree {
    /// The parent of a category. The synthetic root has no parent; every
    /// other category without an explicit parent hangs off the root.
    fn parent_of(&self, category: CategoryId) -> Result<Option<CategoryId>>;

    /// Direct children of a category.
    fn children_of(&self, category: CategoryId) -> Result<Vec<CategoryId>>;

    /// Returns true if the id is a managed forum category (as opposed to
    /// an unrelated node sharing the same storage).
    fn is_managed_category(&self, category: CategoryId) -> Result<bool>;
}

/// In-memory category tree.
///
/// Links are stored as given and not validated: integrity checking is the
/// walker's job, and tests rely on being able to build corrupt trees.
#[derive(Debug, Default)]
pub struct MemoryTree {
    parents: HashMap<CategoryId, CategoryId>,
    children: HashMap<CategoryId, BTreeSet<CategoryId>>,
    managed: HashSet<CategoryId>,
}

impl MemoryTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a managed category under the given parent, replacing any
    /// previous placement.
    pub fn insert(&mut self, category: CategoryId, parent: CategoryId) {
        if let Some(old_parent) = self.parents.insert(category, parent) {
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.remove(&category);
            }
        }
        self.children.entry(parent).or_default().insert(category);
        self.managed.insert(category);
    }

    /// Removes a category. Its children keep their links and resolve
    /// against the next surviving ancestor through the removed id's
    /// former parent chain.
    pub fn remove(&mut self, category: CategoryId) {
        if let Some(parent) = self.parents.remove(&category) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(&category);
            }
        }
        self.managed.remove(&category);
    }

    /// Marks an id as a non-forum node sharing the tree storage.
    pub fn insert_unmanaged(&mut self, category: CategoryId, parent: CategoryId) {
        self.insert(category, parent);
        self.managed.remove(&category);
    }
}

impl CategoryTree for MemoryTree {
    fn parent_of(&self, category: CategoryId) -> Result<Option<CategoryId>> {
        if category == ROOT_CATEGORY {
            return Ok(None);
        }
        Ok(Some(
            self.parents.get(&category).copied().unwrap_or(ROOT_CATEGORY),
        ))
    }

    fn children_of(&self, category: CategoryId) -> Result<Vec<CategoryId>> {
        Ok(self
            .children
            .get(&category)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn is_managed_category(&self, category: CategoryId) -> Result<bool> {
        Ok(self.managed.contains(&category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_no_parent() {
        let tree = MemoryTree::new();
        assert_eq!(tree.parent_of(ROOT_CATEGORY).unwrap(), None);
    }

    #[test]
    fn test_unknown_category_hangs_off_root() {
        let tree = MemoryTree::new();
        assert_eq!(tree.parent_of(42).unwrap(), Some(ROOT_CATEGORY));
    }

    #[test]
    fn test_parent_child_links() {
        let mut tree = MemoryTree::new();
        tree.insert(1, ROOT_CATEGORY);
        tree.insert(2, 1);
        tree.insert(3, 1);

        assert_eq!(tree.parent_of(2).unwrap(), Some(1));
        assert_eq!(tree.children_of(1).unwrap(), vec![2, 3]);
        assert!(tree.is_managed_category(2).unwrap());
        assert!(!tree.is_managed_category(99).unwrap());
    }

    #[test]
    fn test_reparent_updates_children() {
        let mut tree = MemoryTree::new();
        tree.insert(1, ROOT_CATEGORY);
        tree.insert(2, ROOT_CATEGORY);
        tree.insert(3, 1);

        tree.insert(3, 2);
        assert!(tree.children_of(1).unwrap().is_empty());
        assert_eq!(tree.children_of(2).unwrap(), vec![3]);
    }

    #[test]
    fn test_remove_keeps_descendants() {
        let mut tree = MemoryTree::new();
        tree.insert(1, ROOT_CATEGORY);
        tree.insert(2, 1);
        tree.remove(1);

        assert!(!tree.is_managed_category(1).unwrap());
        // The child's link survives; resolution walks through the gone id.
        assert_eq!(tree.parent_of(2).unwrap(), Some(1));
    }
}
