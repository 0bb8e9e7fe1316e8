//! Three-valued access decisions and their combination algebra.
//!
//! Every authorization check produces a [`Decision`]: a verdict from the
//! `Forbidden`/`Allowed`/`Neutral` lattice plus the set of cache
//! dependencies the verdict was computed from. Partial decisions are merged
//! with [`Decision::and`] / [`Decision::or`]:
//!
//! - `and`: `Forbidden` dominates; `Allowed` only if both are `Allowed`;
//!   otherwise `Neutral`.
//! - `or`: `Allowed` dominates; `Forbidden` only if both are `Forbidden`;
//!   otherwise `Neutral`.
//!
//! Cache dependencies are unioned through every composition, never dropped,
//! so the final decision always names everything it depended on.

use crate::{CategoryId, ReplyId, TopicId};
use std::collections::BTreeSet;
use std::fmt;

/// The verdict of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Access is granted.
    Allowed,
    /// No opinion; defers to other checks.
    Neutral,
    /// Access is denied. Dominates `and`-composition.
    Forbidden,
}

impl Verdict {
    fn and(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Forbidden, _) | (_, Verdict::Forbidden) => Verdict::Forbidden,
            (Verdict::Allowed, Verdict::Allowed) => Verdict::Allowed,
            _ => Verdict::Neutral,
        }
    }

    fn or(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Allowed, _) | (_, Verdict::Allowed) => Verdict::Allowed,
            (Verdict::Forbidden, Verdict::Forbidden) => Verdict::Forbidden,
            _ => Verdict::Neutral,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allowed => write!(f, "allowed"),
            Verdict::Neutral => write!(f, "neutral"),
            Verdict::Forbidden => write!(f, "forbidden"),
        }
    }
}

/// A single cache dependency of a decision.
///
/// Consumers invalidate derived pages when any dependency changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheDep {
    /// The decision depended on a category's resolved access record.
    Category(CategoryId),
    /// The decision depended on a topic's state.
    Topic(TopicId),
    /// The decision depended on a reply's state.
    Reply(ReplyId),
}

/// An access decision: a verdict plus accumulated cache dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    verdict: Verdict,
    deps: BTreeSet<CacheDep>,
}

impl Decision {
    /// Creates an `Allowed` decision with no dependencies.
    pub fn allowed() -> Self {
        Self::new(Verdict::Allowed)
    }

    /// Creates a `Neutral` decision with no dependencies.
    pub fn neutral() -> Self {
        Self::new(Verdict::Neutral)
    }

    /// Creates a `Forbidden` decision with no dependencies.
    pub fn forbidden() -> Self {
        Self::new(Verdict::Forbidden)
    }

    /// Creates a decision with the given verdict and no dependencies.
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            deps: BTreeSet::new(),
        }
    }

    /// `Allowed` if the condition holds, `Forbidden` otherwise.
    pub fn allowed_if(condition: bool) -> Self {
        if condition {
            Self::allowed()
        } else {
            Self::forbidden()
        }
    }

    /// Adds a cache dependency.
    pub fn with_dep(mut self, dep: CacheDep) -> Self {
        self.deps.insert(dep);
        self
    }

    /// Adds multiple cache dependencies.
    pub fn with_deps(mut self, deps: impl IntoIterator<Item = CacheDep>) -> Self {
        self.deps.extend(deps);
        self
    }

    /// Combines two decisions with AND semantics.
    ///
    /// Dependencies of both operands are retained regardless of verdict.
    pub fn and(mut self, other: Decision) -> Decision {
        self.verdict = self.verdict.and(other.verdict);
        self.deps.extend(other.deps);
        self
    }

    /// Combines two decisions with OR semantics.
    ///
    /// Dependencies of both operands are retained regardless of verdict.
    pub fn or(mut self, other: Decision) -> Decision {
        self.verdict = self.verdict.or(other.verdict);
        self.deps.extend(other.deps);
        self
    }

    /// The verdict.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Returns true if the verdict is `Allowed`.
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allowed
    }

    /// Returns true if the verdict is `Forbidden`.
    pub fn is_forbidden(&self) -> bool {
        self.verdict == Verdict::Forbidden
    }

    /// Returns true if the verdict is `Neutral`.
    pub fn is_neutral(&self) -> bool {
        self.verdict == Verdict::Neutral
    }

    /// The accumulated cache dependencies.
    pub fn deps(&self) -> &BTreeSet<CacheDep> {
        &self.deps
    }
}
