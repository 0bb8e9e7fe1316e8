//! Topic access decisions.
//!
//! A topic lives inside exactly one category, or none. Topics without a
//! category reference are admin-only; everything else resolves the
//! category's access record and layers publication state and ownership on
//! top.

use super::Operation;
use crate::catalog::{ObjectKind, Permission};
use crate::content::{Actor, TopicView};
use crate::decision::{CacheDep, Decision};
use crate::error::Result;
use crate::record::ResolvedAccess;
use crate::storage::AccessStorage;
use crate::store::AccessRecordStore;
use crate::tree::CategoryTree;
use crate::CategoryId;

pub(super) fn check<S: AccessStorage, T: CategoryTree>(
    store: &AccessRecordStore<S, T>,
    actor: &Actor,
    topic: &TopicView,
    operation: Operation,
) -> Result<Decision> {
    let topic_dep = CacheDep::Topic(topic.id);
    let Some(category_id) = topic.category else {
        // No category context: fail closed for everyone but admins.
        return Ok(Decision::allowed_if(actor.admin).with_dep(topic_dep));
    };
    if !store.tree().is_managed_category(category_id)? {
        return Ok(Decision::neutral()
            .with_dep(topic_dep)
            .with_dep(CacheDep::Category(category_id)));
    }
    let resolved = store.resolve(category_id)?;
    let deps: Vec<CacheDep> = resolved.cache_deps().chain([topic_dep]).collect();

    let view = view_decision(&resolved, actor, topic).with_deps(deps.iter().copied());

    let decision = match operation {
        Operation::View => view,
        Operation::Update | Operation::Delete => Decision::allowed_if(resolved.has_permission(
            actor,
            ObjectKind::Topic,
            operation.permission(),
            Some(topic.owner),
        ))
        .with_deps(deps.iter().copied())
        .and(view),
        Operation::Create => Decision::allowed_if(resolved.has_permission(
            actor,
            ObjectKind::Topic,
            Permission::Create,
            None,
        ))
        .with_deps(deps.iter().copied()),
    };
    Ok(decision)
}

/// Decides topic creation inside a category.
pub(super) fn create<S: AccessStorage, T: CategoryTree>(
    store: &AccessRecordStore<S, T>,
    actor: &Actor,
    category_id: CategoryId,
) -> Result<Decision> {
    if !store.tree().is_managed_category(category_id)? {
        return Ok(Decision::neutral().with_dep(CacheDep::Category(category_id)));
    }
    let resolved = store.resolve(category_id)?;
    let deps: Vec<CacheDep> = resolved.cache_deps().collect();
    Ok(
        Decision::allowed_if(resolved.has_permission(
            actor,
            ObjectKind::Topic,
            Permission::Create,
            None,
        ))
        .with_deps(deps),
    )
}

/// Topic visibility: category view access, and the topic must be
/// published unless the actor owns it or moderates the category.
fn view_decision(resolved: &ResolvedAccess, actor: &Actor, topic: &TopicView) -> Decision {
    let category_view =
        resolved.has_permission(actor, ObjectKind::Category, Permission::View, None);
    let owns = actor.is_authenticated() && actor.id == topic.owner;
    let visible = topic.published || owns || resolved.is_moderator(actor);
    Decision::allowed_if(category_view && visible)
}
