//! Shared constants for the access-control engine.

/// Category id of the synthetic global-default root.
///
/// Never a real category: it anchors every inheritance chain and its
/// record never inherits, regardless of what callers try to set.
pub const ROOT_CATEGORY: u64 = 0;

/// User id of the anonymous (unauthenticated) user.
///
/// Never stored in member or moderator sets.
pub const ANONYMOUS_USER: u64 = 0;

// =============================================================================
// Tree Walk Limits
// =============================================================================

/// Maximum depth for inheritance resolution and cascade walks.
///
/// A well-formed category tree is nowhere near this deep; exceeding it
/// means the parent links are corrupted in a way the cycle guard cannot
/// see (aliased ids rather than a true cycle) and the walk fails with a
/// data-integrity error.
pub const MAX_TREE_DEPTH: usize = 128;
