//! Narrow read-model of the content layer.
//!
//! The engine never loads or saves forum content itself; it consumes small
//! snapshot views of the entities it authorizes against, handed in by the
//! caller or looked up through [`ContentIndex`]. The views carry exactly
//! the fields the decision rules read: ownership, publication state, the
//! category/topic linkage, and the per-topic reply mode.

use crate::constants::ANONYMOUS_USER;
use crate::{CategoryId, ReplyId, TopicId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The acting user, as seen by the decision engine.
///
/// Roles are derived per category; the only global attributes are the
/// admin capability and the capability to view one's own unpublished
/// replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User id; [`ANONYMOUS_USER`] for unauthenticated visitors.
    pub id: UserId,
    /// Global administer-forums capability. Checked before any role or
    /// tree lookup; independent of the category hierarchy.
    pub admin: bool,
    /// Global capability to view one's own unpublished replies.
    pub view_own_unpublished: bool,
}

impl Actor {
    /// Creates an authenticated actor with no extra capabilities.
    pub fn user(id: UserId) -> Self {
        Self {
            id,
            admin: false,
            view_own_unpublished: false,
        }
    }

    /// Creates an administrator.
    pub fn admin(id: UserId) -> Self {
        Self {
            id,
            admin: true,
            view_own_unpublished: false,
        }
    }

    /// Creates the anonymous actor.
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_USER,
            admin: false,
            view_own_unpublished: false,
        }
    }

    /// Returns true if the actor is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.id != ANONYMOUS_USER
    }
}

/// Reply mode of a topic's reply field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReplyMode {
    /// Replies can be posted and are shown.
    Open = 0,
    /// Existing replies are shown but nothing can be posted or edited.
    Closed = 1,
    /// Replies are hidden from everyone but moderators.
    Hidden = 2,
}

impl ReplyMode {
    /// Parses the stored integer representation.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ReplyMode::Open),
            1 => Some(ReplyMode::Closed),
            2 => Some(ReplyMode::Hidden),
            _ => None,
        }
    }
}

/// Snapshot view of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicView {
    /// Topic id.
    pub id: TopicId,
    /// The category the topic lives in. A topic belongs to exactly one
    /// category or none; `None` means only admins may act on it.
    pub category: Option<CategoryId>,
    /// Author of the topic.
    pub owner: UserId,
    /// Publication state.
    pub published: bool,
    /// Reply mode of the topic's reply field.
    pub reply_mode: ReplyMode,
}

/// Snapshot view of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyView {
    /// Reply id.
    pub id: ReplyId,
    /// The topic the reply is attached to.
    pub topic: TopicId,
    /// Author of the reply.
    pub owner: UserId,
    /// Publication state.
    pub published: bool,
    /// Parent reply when nested; `None` for a direct reply to the topic.
    pub parent: Option<ReplyId>,
}

/// Content-layer lookups the engine needs to resolve reply context.
///
/// A missing entity is `None`; the engine treats unresolvable context as
/// `Forbidden`, never as an error.
pub trait ContentIndex {
    /// Looks up a topic by id.
    fn topic(&self, id: TopicId) -> Option<TopicView>;

    /// Looks up a reply by id.
    fn reply(&self, id: ReplyId) -> Option<ReplyView>;
}

/// In-memory content index for tests, demos, and request-scoped snapshots.
#[derive(Debug, Default)]
pub struct MemoryContent {
    topics: HashMap<TopicId, TopicView>,
    replies: HashMap<ReplyId, ReplyView>,
}

impl MemoryContent {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a topic view.
    pub fn insert_topic(&mut self, topic: TopicView) {
        self.topics.insert(topic.id, topic);
    }

    /// Inserts or replaces a reply view.
    pub fn insert_reply(&mut self, reply: ReplyView) {
        self.replies.insert(reply.id, reply);
    }
}

impl ContentIndex for MemoryContent {
    fn topic(&self, id: TopicId) -> Option<TopicView> {
        self.topics.get(&id).copied()
    }

    fn reply(&self, id: ReplyId) -> Option<ReplyView> {
        self.replies.get(&id).copied()
    }
}
