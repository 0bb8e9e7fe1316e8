//! Static permission/role catalog.
//!
//! The catalog defines the permission schema the whole engine validates
//! against: which (object kind, permission) pairs exist, which roles exist,
//! and which permissions are categorically disabled for which roles.
//!
//! It is pure static data. Lookups never allocate, never touch I/O, and
//! never fail; callers that accept dynamic input (admin forms) parse labels
//! through the `from_label` constructors and surface unknown names as
//! [`InvalidPolicy`](crate::AccessError::InvalidPolicy) at that boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of target object an operation is authorized against.
///
/// Keys one axis of the permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectKind {
    /// A node in the forum hierarchy; may contain topics and child categories.
    Category = 1,
    /// A content item posted within a category.
    Topic = 2,
    /// A response to a topic; may nest under a parent reply.
    Reply = 3,
}

impl ObjectKind {
    /// All object kinds, in catalog order.
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Category, ObjectKind::Topic, ObjectKind::Reply];

    /// Human-readable label, as shown in the permission matrix UI.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Category => "category",
            ObjectKind::Topic => "topic",
            ObjectKind::Reply => "reply",
        }
    }

    /// Parses a label back into an object kind.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A grantable permission.
///
/// `View` exists only for categories; the mutation permissions exist for
/// topics and replies. The `*Own` variants restrict the matching operation
/// to content the acting user authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Permission {
    /// See the category and the content inside it.
    View = 1,
    /// Create new content of this kind.
    Create = 2,
    /// Edit any content of this kind.
    Update = 3,
    /// Edit own content of this kind.
    UpdateOwn = 4,
    /// Delete any content of this kind.
    Delete = 5,
    /// Delete own content of this kind.
    DeleteOwn = 6,
}

impl Permission {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Create => "create",
            Permission::Update => "update",
            Permission::UpdateOwn => "update_own",
            Permission::Delete => "delete",
            Permission::DeleteOwn => "delete_own",
        }
    }

    /// Parses a label back into a permission.
    pub fn from_label(label: &str) -> Option<Self> {
        [
            Permission::View,
            Permission::Create,
            Permission::Update,
            Permission::UpdateOwn,
            Permission::Delete,
            Permission::DeleteOwn,
        ]
        .into_iter()
        .find(|p| p.label() == label)
    }

    /// Returns the ownership-restricted variant of this permission, if one
    /// exists (`Update` -> `UpdateOwn`, `Delete` -> `DeleteOwn`).
    pub fn own_variant(&self) -> Option<Permission> {
        match self {
            Permission::Update => Some(Permission::UpdateOwn),
            Permission::Delete => Some(Permission::DeleteOwn),
            _ => None,
        }
    }

    /// Returns true if this is an ownership-restricted permission.
    pub fn is_own(&self) -> bool {
        matches!(self, Permission::UpdateOwn | Permission::DeleteOwn)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A role the permission matrix can grant permissions to.
///
/// Roles are derived per check, never stored on users: moderator and member
/// are set membership in the resolved moderator/member sets, authenticated
/// and anonymous fall out of the user id. Admin is deliberately absent: it
/// is a capability flag on the acting user, checked before role resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Unauthenticated visitor.
    Anonymous = 1,
    /// Any logged-in user.
    Authenticated = 2,
    /// User listed in the category's resolved member set.
    Member = 3,
    /// User listed in the category's resolved moderator set.
    Moderator = 4,
}

impl Role {
    /// All roles, in precedence order (lowest first).
    pub const ALL: [Role; 4] = [
        Role::Anonymous,
        Role::Authenticated,
        Role::Member,
        Role::Moderator,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::Authenticated => "authenticated",
            Role::Member => "member",
            Role::Moderator => "moderator",
        }
    }

    /// Parses a label back into a role.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label() == label)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One catalog entry: a (kind, permission) pair with its UI label and the
/// roles it can never be granted to.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEntry {
    /// The object kind this permission applies to.
    pub kind: ObjectKind,
    /// The permission.
    pub permission: Permission,
    /// Label shown in the permission matrix UI.
    pub label: &'static str,
    /// Roles this permission is categorically disabled for. Grants to
    /// these roles are silently dropped rather than rejected.
    pub disabled_for: &'static [Role],
}

/// Ownership-restricted permissions are meaningless for anonymous users.
const OWN_DISABLED: &[Role] = &[Role::Anonymous];

/// The full permission catalog.
const CATALOG: &[PermissionEntry] = &[
    PermissionEntry {
        kind: ObjectKind::Category,
        permission: Permission::View,
        label: "view this category",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Topic,
        permission: Permission::Create,
        label: "create topics",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Topic,
        permission: Permission::Update,
        label: "edit any topic",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Topic,
        permission: Permission::UpdateOwn,
        label: "edit own topics",
        disabled_for: OWN_DISABLED,
    },
    PermissionEntry {
        kind: ObjectKind::Topic,
        permission: Permission::Delete,
        label: "delete any topic",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Topic,
        permission: Permission::DeleteOwn,
        label: "delete own topics",
        disabled_for: OWN_DISABLED,
    },
    PermissionEntry {
        kind: ObjectKind::Reply,
        permission: Permission::Create,
        label: "post replies",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Reply,
        permission: Permission::Update,
        label: "edit any reply",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Reply,
        permission: Permission::UpdateOwn,
        label: "edit own replies",
        disabled_for: OWN_DISABLED,
    },
    PermissionEntry {
        kind: ObjectKind::Reply,
        permission: Permission::Delete,
        label: "delete any reply",
        disabled_for: &[],
    },
    PermissionEntry {
        kind: ObjectKind::Reply,
        permission: Permission::DeleteOwn,
        label: "delete own replies",
        disabled_for: OWN_DISABLED,
    },
];

/// Returns the full catalog table.
pub fn entries() -> &'static [PermissionEntry] {
    CATALOG
}

/// Looks up a catalog entry for a (kind, permission) pair.
pub fn entry(kind: ObjectKind, permission: Permission) -> Option<&'static PermissionEntry> {
    CATALOG
        .iter()
        .find(|e| e.kind == kind && e.permission == permission)
}

/// Returns true if the (kind, permission) pair exists in the catalog.
pub fn permission_exists(kind: ObjectKind, permission: Permission) -> bool {
    entry(kind, permission).is_some()
}

/// Returns true if the role exists in the catalog.
///
/// Total for the typed enum; kept for callers that mirror the matrix over
/// a dynamic transport and want a single validation surface.
pub fn role_exists(role: Role) -> bool {
    Role::ALL.contains(&role)
}

/// Returns true if the catalog disables this permission for this role.
///
/// A disabled combination is dropped on assignment, not rejected: the pair
/// itself is valid, it just cannot be granted to that role.
pub fn permission_disabled_for_role(kind: ObjectKind, permission: Permission, role: Role) -> bool {
    entry(kind, permission)
        .map(|e| e.disabled_for.contains(&role))
        .unwrap_or(false)
}

/// Returns the permissions defined for an object kind, in catalog order.
pub fn permissions_for(kind: ObjectKind) -> impl Iterator<Item = Permission> {
    CATALOG
        .iter()
        .filter(move |e| e.kind == kind)
        .map(|e| e.permission)
}
