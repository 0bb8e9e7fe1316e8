//! Per-category access records.
//!
//! An [`AccessRecord`] holds the *raw* policy of one category: three
//! independently-inheritable facets (member list, moderator list,
//! permission matrix) plus their inherit flags. Raw values are meaningful
//! only when the matching flag is off; inheritance itself is resolved by
//! the record store, which walks the category tree and produces a
//! [`ResolvedAccess`], the effective policy a decision is made against.
//!
//! The record knows nothing about the tree beyond its own id. Pre-save
//! diffing works the same way: the store loads the previously-persisted
//! snapshot once and passes it to [`AccessRecord::changed_facets`]
//! explicitly; no scratch state is ever stashed on the record.

use crate::catalog::{self, ObjectKind, Permission, Role};
use crate::constants::{ANONYMOUS_USER, ROOT_CATEGORY};
use crate::content::Actor;
use crate::decision::CacheDep;
use crate::error::{AccessError, Result};
use crate::{CategoryId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One of the three independently-inheritable aspects of an access record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Facet {
    /// The member user list.
    Members,
    /// The moderator user list.
    Moderators,
    /// The permission matrix.
    Permissions,
}

impl Facet {
    /// All facets.
    pub const ALL: [Facet; 3] = [Facet::Members, Facet::Moderators, Facet::Permissions];

    /// The two user-list facets.
    pub const USER_FACETS: [Facet; 2] = [Facet::Members, Facet::Moderators];

    /// Human-readable label, also used as a storage key component.
    pub fn label(&self) -> &'static str {
        match self {
            Facet::Members => "members",
            Facet::Moderators => "moderators",
            Facet::Permissions => "permissions",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A typed permission matrix: role -> object kind -> granted permissions.
///
/// Validated once against the [`catalog`] when grants are added; nothing
/// downstream re-validates. Unknown (kind, permission) pairs are an
/// [`InvalidPolicy`](AccessError::InvalidPolicy) error; combinations the
/// catalog disables for a role are silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMatrix {
    grants: BTreeMap<Role, BTreeMap<ObjectKind, BTreeSet<Permission>>>,
}

impl PermissionMatrix {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matrix from (role, kind, permission) triples.
    ///
    /// All-or-nothing: the first invalid triple fails the whole build.
    pub fn from_grants(
        grants: impl IntoIterator<Item = (Role, ObjectKind, Permission)>,
    ) -> Result<Self> {
        let mut matrix = Self::new();
        for (role, kind, permission) in grants {
            matrix.grant(role, kind, permission)?;
        }
        Ok(matrix)
    }

    /// Builds a matrix from labeled input, as supplied by an admin form or
    /// a dynamic transport.
    ///
    /// Shape: role label -> kind label -> permission labels. Any unknown
    /// label fails the whole build with `InvalidPolicy`.
    pub fn from_labels<'a>(
        labeled: impl IntoIterator<Item = (&'a str, Vec<(&'a str, Vec<&'a str>)>)>,
    ) -> Result<Self> {
        let mut matrix = Self::new();
        for (role_label, kinds) in labeled {
            let role = Role::from_label(role_label)
                .ok_or_else(|| AccessError::invalid_policy(format!("unknown role '{role_label}'")))?;
            for (kind_label, permissions) in kinds {
                let kind = ObjectKind::from_label(kind_label).ok_or_else(|| {
                    AccessError::invalid_policy(format!("unknown object kind '{kind_label}'"))
                })?;
                for permission_label in permissions {
                    let permission = Permission::from_label(permission_label).ok_or_else(|| {
                        AccessError::invalid_policy(format!(
                            "unknown permission '{permission_label}'"
                        ))
                    })?;
                    matrix.grant(role, kind, permission)?;
                }
            }
        }
        Ok(matrix)
    }

    /// Adds a single grant.
    ///
    /// Fails with `InvalidPolicy` if the (kind, permission) pair does not
    /// exist in the catalog. Grants the catalog disables for the role are
    /// dropped without error.
    pub fn grant(&mut self, role: Role, kind: ObjectKind, permission: Permission) -> Result<()> {
        if !catalog::role_exists(role) {
            return Err(AccessError::invalid_policy(format!("unknown role '{role}'")));
        }
        if !catalog::permission_exists(kind, permission) {
            return Err(AccessError::invalid_policy(format!(
                "permission '{permission}' does not exist for object kind '{kind}'"
            )));
        }
        if catalog::permission_disabled_for_role(kind, permission, role) {
            return Ok(());
        }
        self.grants
            .entry(role)
            .or_default()
            .entry(kind)
            .or_default()
            .insert(permission);
        Ok(())
    }

    /// Returns true if the matrix grants the permission to the role for
    /// the kind.
    pub fn allows(&self, role: Role, kind: ObjectKind, permission: Permission) -> bool {
        self.grants_for(role, kind)
            .map(|set| set.contains(&permission))
            .unwrap_or(false)
    }

    /// Returns the permission set granted to a role for a kind, if any.
    pub fn grants_for(&self, role: Role, kind: ObjectKind) -> Option<&BTreeSet<Permission>> {
        self.grants.get(&role).and_then(|kinds| kinds.get(&kind))
    }

    /// Returns true if no grants are present.
    pub fn is_empty(&self) -> bool {
        self.grants.values().flat_map(|k| k.values()).all(BTreeSet::is_empty)
    }

    /// Iterates over all grants as (role, kind, permission) triples, in
    /// deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, ObjectKind, Permission)> + '_ {
        self.grants.iter().flat_map(|(&role, kinds)| {
            kinds.iter().flat_map(move |(&kind, permissions)| {
                permissions.iter().map(move |&p| (role, kind, p))
            })
        })
    }
}

/// Which parts of a record differ from its last-persisted snapshot.
///
/// Drives the per-facet skip logic in `save`: unchanged facets produce no
/// writes and no cascade walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedFacets {
    /// The inherit-flag settings row differs.
    pub settings: bool,
    /// The members facet differs.
    pub members: bool,
    /// The moderators facet differs.
    pub moderators: bool,
    /// The permissions facet differs.
    pub permissions: bool,
}

impl ChangedFacets {
    /// Reports every facet changed; used for the first save of a category
    /// that has never been persisted.
    pub fn all() -> Self {
        Self {
            settings: true,
            members: true,
            moderators: true,
            permissions: true,
        }
    }

    /// Returns true if anything changed.
    pub fn any(&self) -> bool {
        self.settings || self.members || self.moderators || self.permissions
    }

    /// Returns the change bit for a facet.
    pub fn facet(&self, facet: Facet) -> bool {
        match facet {
            Facet::Members => self.members,
            Facet::Moderators => self.moderators,
            Facet::Permissions => self.permissions,
        }
    }
}

/// The raw access policy of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    category_id: CategoryId,
    inherit_members: bool,
    inherit_moderators: bool,
    inherit_permissions: bool,
    members: BTreeSet<UserId>,
    moderators: BTreeSet<UserId>,
    permissions: PermissionMatrix,
}

impl AccessRecord {
    /// Creates the default record for a category: fully inheriting, empty
    /// raw state. The synthetic root never inherits.
    pub fn new(category_id: CategoryId) -> Self {
        let inherit = category_id != ROOT_CATEGORY;
        Self {
            category_id,
            inherit_members: inherit,
            inherit_moderators: inherit,
            inherit_permissions: inherit,
            members: BTreeSet::new(),
            moderators: BTreeSet::new(),
            permissions: PermissionMatrix::new(),
        }
    }

    /// The category this record belongs to.
    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    /// Returns true if this is the synthetic root record.
    pub fn is_root(&self) -> bool {
        self.category_id == ROOT_CATEGORY
    }

    /// Returns the inherit flag for a facet.
    pub fn inherits(&self, facet: Facet) -> bool {
        match facet {
            Facet::Members => self.inherit_members,
            Facet::Moderators => self.inherit_moderators,
            Facet::Permissions => self.inherit_permissions,
        }
    }

    /// Inherit flag for the members facet.
    pub fn inherit_members(&self) -> bool {
        self.inherit_members
    }

    /// Inherit flag for the moderators facet.
    pub fn inherit_moderators(&self) -> bool {
        self.inherit_moderators
    }

    /// Inherit flag for the permissions facet.
    pub fn inherit_permissions(&self) -> bool {
        self.inherit_permissions
    }

    /// The raw member set. Meaningful only when `!inherit_members()`.
    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    /// The raw moderator set. Meaningful only when `!inherit_moderators()`.
    pub fn moderators(&self) -> &BTreeSet<UserId> {
        &self.moderators
    }

    /// The raw user set for a user facet; `None` for the permissions facet.
    pub fn users(&self, facet: Facet) -> Option<&BTreeSet<UserId>> {
        match facet {
            Facet::Members => Some(&self.members),
            Facet::Moderators => Some(&self.moderators),
            Facet::Permissions => None,
        }
    }

    /// The raw permission matrix. Meaningful only when
    /// `!inherit_permissions()`.
    pub fn permissions(&self) -> &PermissionMatrix {
        &self.permissions
    }

    /// Sets the members facet.
    ///
    /// The anonymous user id is stripped from the set; the root record
    /// never inherits regardless of the flag passed.
    pub fn set_members(&mut self, inherit: bool, users: impl IntoIterator<Item = UserId>) {
        self.inherit_members = inherit && !self.is_root();
        self.members = Self::clean_user_set(users);
    }

    /// Sets the moderators facet. Same anonymous/root rules as
    /// [`set_members`](Self::set_members).
    pub fn set_moderators(&mut self, inherit: bool, users: impl IntoIterator<Item = UserId>) {
        self.inherit_moderators = inherit && !self.is_root();
        self.moderators = Self::clean_user_set(users);
    }

    /// Sets the permissions facet from (role, kind, permission) triples.
    ///
    /// Validates every triple against the catalog before touching the
    /// record; on `InvalidPolicy` the record is unchanged.
    pub fn set_permissions(
        &mut self,
        inherit: bool,
        grants: impl IntoIterator<Item = (Role, ObjectKind, Permission)>,
    ) -> Result<()> {
        let matrix = PermissionMatrix::from_grants(grants)?;
        self.set_permission_matrix(inherit, matrix);
        Ok(())
    }

    /// Sets the permissions facet from labeled input (admin form shape).
    ///
    /// On `InvalidPolicy` the record is unchanged.
    pub fn set_permission_labels<'a>(
        &mut self,
        inherit: bool,
        labeled: impl IntoIterator<Item = (&'a str, Vec<(&'a str, Vec<&'a str>)>)>,
    ) -> Result<()> {
        let matrix = PermissionMatrix::from_labels(labeled)?;
        self.set_permission_matrix(inherit, matrix);
        Ok(())
    }

    /// Sets the permissions facet from an already-validated matrix.
    pub fn set_permission_matrix(&mut self, inherit: bool, matrix: PermissionMatrix) {
        self.inherit_permissions = inherit && !self.is_root();
        self.permissions = matrix;
    }

    fn clean_user_set(users: impl IntoIterator<Item = UserId>) -> BTreeSet<UserId> {
        users
            .into_iter()
            .filter(|&uid| uid != ANONYMOUS_USER)
            .collect()
    }

    /// Diffs this record against its last-persisted snapshot.
    ///
    /// `previously_persisted` is false when the category has never had a
    /// settings row; the first save then writes all three facets instead
    /// of trusting a diff against a synthesized default.
    pub fn changed_facets(
        &self,
        previous: &AccessRecord,
        previously_persisted: bool,
    ) -> ChangedFacets {
        if !previously_persisted {
            return ChangedFacets::all();
        }
        let settings = self.inherit_members != previous.inherit_members
            || self.inherit_moderators != previous.inherit_moderators
            || self.inherit_permissions != previous.inherit_permissions;
        // A facet changes when its flag flips, or when it is non-inheriting
        // and its raw value differs. A raw value behind an unchanged
        // inherit flag is dormant and forces no write.
        let members = self.inherit_members != previous.inherit_members
            || (!self.inherit_members && self.members != previous.members);
        let moderators = self.inherit_moderators != previous.inherit_moderators
            || (!self.inherit_moderators && self.moderators != previous.moderators);
        let permissions = self.inherit_permissions != previous.inherit_permissions
            || (!self.inherit_permissions && self.permissions != previous.permissions);
        ChangedFacets {
            settings,
            members,
            moderators,
            permissions,
        }
    }
}

/// The effective access policy of one category, with all three facets
/// resolved through the inheritance chain.
///
/// Produced by the record store; carries every category id the resolution
/// touched so decisions can report precise cache dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    category_id: CategoryId,
    members: BTreeSet<UserId>,
    moderators: BTreeSet<UserId>,
    permissions: PermissionMatrix,
    sources: BTreeSet<CategoryId>,
}

impl ResolvedAccess {
    /// Assembles a resolved policy. `sources` must contain every category
    /// id consulted while resolving the three facets.
    pub fn new(
        category_id: CategoryId,
        members: BTreeSet<UserId>,
        moderators: BTreeSet<UserId>,
        permissions: PermissionMatrix,
        sources: BTreeSet<CategoryId>,
    ) -> Self {
        Self {
            category_id,
            members,
            moderators,
            permissions,
            sources,
        }
    }

    /// The category this policy applies to.
    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    /// The effective member set.
    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    /// The effective moderator set.
    pub fn moderators(&self) -> &BTreeSet<UserId> {
        &self.moderators
    }

    /// The effective permission matrix.
    pub fn permissions(&self) -> &PermissionMatrix {
        &self.permissions
    }

    /// Derives the actor's role for this category.
    ///
    /// Admin is not a role; it is checked separately before role
    /// resolution wherever it grants a bypass.
    pub fn role_for(&self, actor: &Actor) -> Role {
        if !actor.is_authenticated() {
            Role::Anonymous
        } else if self.moderators.contains(&actor.id) {
            Role::Moderator
        } else if self.members.contains(&actor.id) {
            Role::Member
        } else {
            Role::Authenticated
        }
    }

    /// Returns true if the actor moderates this category.
    ///
    /// Admins moderate every category.
    pub fn is_moderator(&self, actor: &Actor) -> bool {
        actor.admin || (actor.is_authenticated() && self.moderators.contains(&actor.id))
    }

    /// Checks whether the actor holds a permission for an object kind.
    ///
    /// Admin bypasses everything. Otherwise the actor's derived role must
    /// hold an exact grant, or, for `Update`/`Delete` with a known owner,
    /// the `_own` variant when the actor is that owner. Anonymous users
    /// only ever match exact grants.
    pub fn has_permission(
        &self,
        actor: &Actor,
        kind: ObjectKind,
        permission: Permission,
        owner: Option<UserId>,
    ) -> bool {
        if actor.admin {
            return true;
        }
        let role = self.role_for(actor);
        let Some(granted) = self.permissions.grants_for(role, kind) else {
            return false;
        };
        if granted.contains(&permission) {
            return true;
        }
        if role == Role::Anonymous {
            return false;
        }
        match (permission.own_variant(), owner) {
            (Some(own), Some(owner_id)) => granted.contains(&own) && owner_id == actor.id,
            _ => false,
        }
    }

    /// Cache dependencies of any decision derived from this policy: one
    /// per category consulted during resolution.
    pub fn cache_deps(&self) -> impl Iterator<Item = CacheDep> + '_ {
        self.sources.iter().map(|&id| CacheDep::Category(id))
    }

    /// The category ids consulted during resolution.
    pub fn sources(&self) -> &BTreeSet<CategoryId> {
        &self.sources
    }
}
