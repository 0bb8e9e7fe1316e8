//! Reply access decisions.
//!
//! Replies attach to a topic's reply field, which carries a per-topic
//! open/closed/hidden mode. Every decision resolves the reply's topic
//! through the content index and the topic's category through the record
//! store; a missing topic, a topic without a category, or a cross-topic
//! parent reply fails closed.

use super::Operation;
use crate::catalog::{ObjectKind, Permission};
use crate::content::{Actor, ContentIndex, ReplyMode, ReplyView, TopicView};
use crate::decision::{CacheDep, Decision};
use crate::error::Result;
use crate::record::ResolvedAccess;
use crate::storage::AccessStorage;
use crate::store::AccessRecordStore;
use crate::tree::CategoryTree;
use crate::ReplyId;

pub(super) fn check<S: AccessStorage, T: CategoryTree, C: ContentIndex>(
    store: &AccessRecordStore<S, T>,
    content: &C,
    actor: &Actor,
    reply: &ReplyView,
    operation: Operation,
) -> Result<Decision> {
    let reply_dep = CacheDep::Reply(reply.id);
    let Some(topic) = content.topic(reply.topic) else {
        // The reply's topic is gone: fail closed.
        return Ok(Decision::forbidden()
            .with_dep(reply_dep)
            .with_dep(CacheDep::Topic(reply.topic)));
    };
    let Some(category_id) = topic.category else {
        return Ok(Decision::forbidden()
            .with_dep(reply_dep)
            .with_dep(CacheDep::Topic(topic.id)));
    };
    if !store.tree().is_managed_category(category_id)? {
        return Ok(Decision::neutral()
            .with_dep(reply_dep)
            .with_dep(CacheDep::Category(category_id)));
    }
    let resolved = store.resolve(category_id)?;
    let deps: Vec<CacheDep> = resolved
        .cache_deps()
        .chain([reply_dep, CacheDep::Topic(topic.id)])
        .collect();

    let moderator = resolved.is_moderator(actor);
    let view = view_decision(&resolved, actor, reply, &topic).with_deps(deps.iter().copied());

    let decision = match operation {
        Operation::View => view,
        Operation::Update | Operation::Delete => {
            // Closed and hidden reply fields accept no edits from
            // non-moderators, ownership notwithstanding.
            let mode_open = topic.reply_mode == ReplyMode::Open || moderator;
            view.and(
                Decision::allowed_if(
                    mode_open
                        && resolved.has_permission(
                            actor,
                            ObjectKind::Reply,
                            operation.permission(),
                            Some(reply.owner),
                        ),
                )
                .with_deps(deps.iter().copied()),
            )
        }
        Operation::Create => create_decision(store, content, actor, &resolved, &topic, reply.parent)?
            .with_deps(deps.iter().copied()),
    };
    Ok(decision)
}

/// Decides whether the actor may post a reply under a topic, optionally
/// nested below a parent reply.
pub(super) fn create<S: AccessStorage, T: CategoryTree, C: ContentIndex>(
    store: &AccessRecordStore<S, T>,
    content: &C,
    actor: &Actor,
    topic: &TopicView,
    parent: Option<ReplyId>,
) -> Result<Decision> {
    let Some(category_id) = topic.category else {
        return Ok(Decision::forbidden().with_dep(CacheDep::Topic(topic.id)));
    };
    if !store.tree().is_managed_category(category_id)? {
        return Ok(Decision::neutral()
            .with_dep(CacheDep::Topic(topic.id))
            .with_dep(CacheDep::Category(category_id)));
    }
    let resolved = store.resolve(category_id)?;
    let deps: Vec<CacheDep> = resolved
        .cache_deps()
        .chain([CacheDep::Topic(topic.id)])
        .collect();
    Ok(create_decision(store, content, actor, &resolved, topic, parent)?.with_deps(deps))
}

fn create_decision<S: AccessStorage, T: CategoryTree, C: ContentIndex>(
    store: &AccessRecordStore<S, T>,
    content: &C,
    actor: &Actor,
    resolved: &ResolvedAccess,
    topic: &TopicView,
    parent: Option<ReplyId>,
) -> Result<Decision> {
    let moderator = resolved.is_moderator(actor);
    let mode_open = topic.reply_mode == ReplyMode::Open || moderator;
    let mut decision = Decision::allowed_if(
        mode_open && resolved.has_permission(actor, ObjectKind::Reply, Permission::Create, None),
    );

    if let Some(parent_id) = parent {
        let Some(parent_reply) = content.reply(parent_id) else {
            return Ok(Decision::forbidden().with_dep(CacheDep::Reply(parent_id)));
        };
        if parent_reply.topic != topic.id {
            // A parent from another topic is never valid context.
            return Ok(Decision::forbidden().with_dep(CacheDep::Reply(parent_id)));
        }
        let parent_view = check(store, content, actor, &parent_reply, Operation::View)?;
        decision = decision.and(parent_view);
    }
    Ok(decision)
}

/// Reply visibility: category view access, the hidden mode gate, and the
/// publication gate (owners with the view-own-unpublished capability and
/// moderators see unpublished replies).
fn view_decision(
    resolved: &ResolvedAccess,
    actor: &Actor,
    reply: &ReplyView,
    topic: &TopicView,
) -> Decision {
    let category_view =
        resolved.has_permission(actor, ObjectKind::Category, Permission::View, None);
    let moderator = resolved.is_moderator(actor);
    let mode_visible = topic.reply_mode != ReplyMode::Hidden || moderator;
    let owns = actor.is_authenticated() && actor.id == reply.owner;
    let published_visible = reply.published || (owns && actor.view_own_unpublished) || moderator;
    Decision::allowed_if(category_view && mode_visible && published_visible)
}
