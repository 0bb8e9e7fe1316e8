//! Category access decisions.
//!
//! `view` comes straight from the permission matrix; `update` is gated to
//! the category's moderators, `delete` to admins, and both additionally
//! require view access. Admins always win immediately through the
//! permission check's bypass.

use super::{CategoryField, Operation};
use crate::catalog::{ObjectKind, Permission};
use crate::content::Actor;
use crate::decision::{CacheDep, Decision};
use crate::error::Result;
use crate::storage::AccessStorage;
use crate::store::AccessRecordStore;
use crate::tree::CategoryTree;
use crate::CategoryId;

pub(super) fn check<S: AccessStorage, T: CategoryTree>(
    store: &AccessRecordStore<S, T>,
    actor: &Actor,
    category_id: CategoryId,
    operation: Operation,
) -> Result<Decision> {
    if !store.tree().is_managed_category(category_id)? {
        // Not a forum category; the engine has no opinion.
        return Ok(Decision::neutral().with_dep(CacheDep::Category(category_id)));
    }
    let resolved = store.resolve(category_id)?;
    let deps: Vec<CacheDep> = resolved.cache_deps().collect();

    let view = Decision::allowed_if(resolved.has_permission(
        actor,
        ObjectKind::Category,
        Permission::View,
        None,
    ))
    .with_deps(deps.iter().copied());

    let decision = match operation {
        Operation::View => view,
        Operation::Update => Decision::allowed_if(resolved.is_moderator(actor))
            .with_deps(deps.iter().copied())
            .and(view),
        Operation::Delete => Decision::allowed_if(actor.admin)
            .with_deps(deps.iter().copied())
            .and(view),
        // Category creation is governed by the site, not the tree.
        Operation::Create => Decision::neutral().with_deps(deps.iter().copied()),
    };
    Ok(decision)
}

pub(super) fn check_field<S: AccessStorage, T: CategoryTree>(
    store: &AccessRecordStore<S, T>,
    actor: &Actor,
    category_id: CategoryId,
    field: CategoryField,
) -> Result<Decision> {
    if field == CategoryField::Status {
        // Visibility is governed by this engine; the status bit is
        // meaningless and must not be editable through this path.
        return Ok(Decision::forbidden().with_dep(CacheDep::Category(category_id)));
    }
    if !store.tree().is_managed_category(category_id)? {
        return Ok(Decision::neutral().with_dep(CacheDep::Category(category_id)));
    }
    let resolved = store.resolve(category_id)?;
    let deps: Vec<CacheDep> = resolved.cache_deps().collect();
    Ok(Decision::allowed_if(resolved.is_moderator(actor)).with_deps(deps))
}
