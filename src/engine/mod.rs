//! Per-object-kind access decisions.
//!
//! The engine is the single authorization gate in front of forum content:
//! it layers object-specific rules (publication state, the topic's reply
//! mode, ownership) over the category's resolved access policy and returns
//! a combined [`Decision`].
//!
//! Failure semantics: missing or unresolvable parent context (a topic
//! with no category, a reply whose topic is gone, a cross-topic parent
//! reply) is always `Forbidden`, never `Neutral`. Tree nodes that are not
//! managed forum categories produce `Neutral`: the engine has no opinion
//! on content it does not govern.

mod category;
mod reply;
mod topic;

use crate::catalog::Permission;
use crate::content::{Actor, ContentIndex, ReplyView, TopicView};
use crate::decision::Decision;
use crate::error::Result;
use crate::storage::AccessStorage;
use crate::store::AccessRecordStore;
use crate::tree::CategoryTree;
use crate::{CategoryId, ReplyId};
use std::fmt;
use tracing::trace;

/// An operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// View the object.
    View,
    /// Create a new object.
    Create,
    /// Edit the object.
    Update,
    /// Delete the object.
    Delete,
}

impl Operation {
    /// The permission this operation maps to in the catalog. Ownership
    /// (`_own`) variants are resolved inside the permission check, not
    /// here.
    pub fn permission(&self) -> Permission {
        match self {
            Operation::View => Permission::View,
            Operation::Create => Permission::Create,
            Operation::Update => Permission::Update,
            Operation::Delete => Permission::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::View => write!(f, "view"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Editable fields of a category, for field-level gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    /// The category name.
    Name,
    /// The category description.
    Description,
    /// The published/status flag. Always forbidden through this path:
    /// visibility is governed by the access engine, not a status bit.
    Status,
}

/// The object an access check targets.
#[derive(Debug, Clone, Copy)]
pub enum AccessTarget<'v> {
    /// A category, by id.
    Category(CategoryId),
    /// A topic.
    Topic(&'v TopicView),
    /// A reply.
    Reply(&'v ReplyView),
}

/// The access decision engine.
///
/// Borrows the record store and a content index for the lifetime of a
/// request; both are cheap to share because the store memoizes record
/// loads per request.
pub struct AccessDecisionEngine<'a, S, T, C> {
    store: &'a AccessRecordStore<S, T>,
    content: &'a C,
}

impl<'a, S: AccessStorage, T: CategoryTree, C: ContentIndex> AccessDecisionEngine<'a, S, T, C> {
    /// Creates an engine over the given store and content index.
    pub fn new(store: &'a AccessRecordStore<S, T>, content: &'a C) -> Self {
        Self { store, content }
    }

    /// Decides whether the actor may perform an operation on a target.
    ///
    /// This is the single gate callers consult before any mutation or
    /// rendering of forum content. `Create` on a [`AccessTarget::Category`]
    /// is `Neutral`: category creation is governed by the site, not the
    /// tree; use [`can_create_topic`](Self::can_create_topic) and
    /// [`can_create_reply`](Self::can_create_reply) for content creation.
    pub fn check(
        &self,
        actor: &Actor,
        target: AccessTarget<'_>,
        operation: Operation,
    ) -> Result<Decision> {
        let decision = match target {
            AccessTarget::Category(id) => category::check(self.store, actor, id, operation)?,
            AccessTarget::Topic(topic) => topic::check(self.store, actor, topic, operation)?,
            AccessTarget::Reply(reply) => {
                reply::check(self.store, self.content, actor, reply, operation)?
            }
        };
        trace!(
            actor = actor.id,
            ?operation,
            verdict = %decision.verdict(),
            "access check"
        );
        Ok(decision)
    }

    /// Decides whether the actor may edit a specific category field.
    pub fn check_category_field(
        &self,
        actor: &Actor,
        category: CategoryId,
        field: CategoryField,
    ) -> Result<Decision> {
        category::check_field(self.store, actor, category, field)
    }

    /// Decides whether the actor may create a topic in a category.
    pub fn can_create_topic(&self, actor: &Actor, category: CategoryId) -> Result<Decision> {
        topic::create(self.store, actor, category)
    }

    /// Decides whether the actor may post a reply under a topic,
    /// optionally nested below a parent reply.
    pub fn can_create_reply(
        &self,
        actor: &Actor,
        topic: &TopicView,
        parent: Option<ReplyId>,
    ) -> Result<Decision> {
        reply::create(self.store, self.content, actor, topic, parent)
    }
}
