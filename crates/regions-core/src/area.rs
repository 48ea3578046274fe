//! Areas: the shared access-control layer of worlds and regions.
//!
//! An [`Area`] owns a protection set, a map of named [`Role`]s, a public
//! role that governs everyone without an explicit membership, and a map of
//! [`Member`]s. Members refer to roles by name only; deleting a role strips
//! it from every member instead of failing.
//!
//! # Document Layout
//!
//! ```text
//! type:        "world" | "region"
//! name:        string
//! protections: { <protection key>: bool, ... }
//! roles:       { <role name>: { permissions: { <permission key>: bool } } }
//! members:     { <uuid>: { name: string, roles: [<role name>, ...] } }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::document::Document;
use crate::error::{DocumentError, RegionError, RegionResult};
use crate::permission::{Permission, PermissionSet, Protection, ProtectionSet};
use crate::user::{Profile, User, UserRegistry};

/// Name of the role every area carries for non-members.
pub const PUBLIC_ROLE: &str = "public";

/// Which variant an area is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AreaKind {
    World,
    Region,
}

impl AreaKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Region => "region",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "world" => Some(Self::World),
            "region" => Some(Self::Region),
            _ => None,
        }
    }
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A named bundle of permissions within one area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    name: String,
    permissions: PermissionSet,
    public: bool,
}

impl Role {
    fn new(name: impl Into<String>, public: bool) -> Self {
        Self {
            name: name.into(),
            permissions: PermissionSet::empty(),
            public,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn permissions(&self) -> PermissionSet {
        self.permissions
    }

    /// True for the area's default role.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.public
    }

    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.has(permission)
    }
}

/// A user's membership in one area.
#[derive(Clone, Debug)]
pub struct Member {
    user: Arc<User>,
    roles: BTreeSet<String>,
}

impl Member {
    #[must_use]
    pub const fn user(&self) -> &Arc<User> {
        &self.user
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.user.id()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.user.name()
    }

    /// Names of the roles assigned to this member.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// A membership read from a document, waiting for its user to be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMember {
    pub id: Uuid,
    pub name: String,
    pub roles: Vec<String>,
}

/// Protections, roles and members of a world or region.
#[derive(Debug)]
pub struct Area {
    name: String,
    kind: AreaKind,
    protections: ProtectionSet,
    public_role: Role,
    roles: BTreeMap<String, Role>,
    members: BTreeMap<Uuid, Member>,
    dirty: bool,
}

impl Area {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AreaKind) -> Self {
        Self {
            name: name.into(),
            kind,
            protections: ProtectionSet::empty(),
            public_role: Role::new(PUBLIC_ROLE, true),
            roles: BTreeMap::new(),
            members: BTreeMap::new(),
            dirty: true,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> AreaKind {
        self.kind
    }

    /// Changed since it was last saved.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // ==================== Protections ====================

    #[must_use]
    pub const fn protections(&self) -> ProtectionSet {
        self.protections
    }

    #[must_use]
    pub fn has_protection(&self, protection: Protection) -> bool {
        self.protections.has(protection)
    }

    pub fn add_protections(&mut self, protections: impl IntoIterator<Item = Protection>) -> bool {
        let changed = self.protections.insert_kinds(protections);
        self.dirty |= changed;
        changed
    }

    pub fn remove_protections(
        &mut self,
        protections: impl IntoIterator<Item = Protection>,
    ) -> bool {
        let changed = self.protections.remove_kinds(protections);
        self.dirty |= changed;
        changed
    }

    // ==================== Roles ====================

    #[must_use]
    pub const fn public_role(&self) -> &Role {
        &self.public_role
    }

    /// Named roles, excluding the public role.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// A role by name. `public` (any case) resolves to the public role.
    #[must_use]
    pub fn get_role(&self, name: &str) -> Option<&Role> {
        if is_public_name(name) {
            return Some(&self.public_role);
        }
        self.roles.get(name)
    }

    fn get_role_mut(&mut self, name: &str) -> Option<&mut Role> {
        if is_public_name(name) {
            return Some(&mut self.public_role);
        }
        self.roles.get_mut(name)
    }

    pub fn register_new_role(&mut self, name: &str) -> RegionResult<&Role> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RegionError::InvalidName(name.to_owned()));
        }
        if is_public_name(name) || self.roles.contains_key(name) {
            return Err(RegionError::RoleExists(name.to_owned()));
        }

        self.dirty = true;
        Ok(self
            .roles
            .entry(name.to_owned())
            .or_insert_with(|| Role::new(name, false)))
    }

    /// Delete a role, stripping it from every member that holds it.
    ///
    /// Returns `Ok(None)` if no such role exists.
    pub fn remove_role(&mut self, name: &str) -> RegionResult<Option<Role>> {
        if is_public_name(name) {
            return Err(RegionError::PublicRole("deleted"));
        }
        let Some(role) = self.roles.remove(name) else {
            return Ok(None);
        };

        for member in self.members.values_mut() {
            member.roles.remove(name);
        }
        self.dirty = true;
        Ok(Some(role))
    }

    pub fn add_permissions_to_role(
        &mut self,
        role: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> RegionResult<bool> {
        let target = self
            .get_role_mut(role)
            .ok_or_else(|| RegionError::RoleNotFound(role.to_owned()))?;
        let changed = target.permissions.insert_kinds(permissions);
        self.dirty |= changed;
        Ok(changed)
    }

    pub fn remove_permissions_from_role(
        &mut self,
        role: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> RegionResult<bool> {
        let target = self
            .get_role_mut(role)
            .ok_or_else(|| RegionError::RoleNotFound(role.to_owned()))?;
        let changed = target.permissions.remove_kinds(permissions);
        self.dirty |= changed;
        Ok(changed)
    }

    // ==================== Members ====================

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    #[must_use]
    pub fn get_member(&self, id: Uuid) -> Option<&Member> {
        self.members.get(&id)
    }

    /// A member by display name, ignoring case.
    #[must_use]
    pub fn find_member_by_name(&self, name: &str) -> Option<&Member> {
        self.members
            .values()
            .find(|m| m.user.name().eq_ignore_ascii_case(name))
    }

    pub fn add_member(&mut self, user: Arc<User>) -> RegionResult<&Member> {
        let id = user.id();
        if self.members.contains_key(&id) {
            return Err(RegionError::MemberExists(user.name()));
        }

        self.dirty = true;
        Ok(self.members.entry(id).or_insert(Member {
            user,
            roles: BTreeSet::new(),
        }))
    }

    pub fn remove_member(&mut self, id: Uuid) -> Option<Member> {
        let member = self.members.remove(&id)?;
        self.dirty = true;
        Some(member)
    }

    pub fn add_role_to_member(&mut self, id: Uuid, role: &str) -> RegionResult<bool> {
        self.check_assignable(role)?;
        let member = self
            .members
            .get_mut(&id)
            .ok_or_else(|| RegionError::MemberNotFound(id.to_string()))?;
        let changed = member.roles.insert(role.to_owned());
        self.dirty |= changed;
        Ok(changed)
    }

    pub fn remove_role_from_member(&mut self, id: Uuid, role: &str) -> RegionResult<bool> {
        self.check_assignable(role)?;
        let member = self
            .members
            .get_mut(&id)
            .ok_or_else(|| RegionError::MemberNotFound(id.to_string()))?;
        let changed = member.roles.remove(role);
        self.dirty |= changed;
        Ok(changed)
    }

    fn check_assignable(&self, role: &str) -> RegionResult<()> {
        if is_public_name(role) {
            return Err(RegionError::PublicRole("assigned"));
        }
        if !self.roles.contains_key(role) {
            return Err(RegionError::RoleNotFound(role.to_owned()));
        }
        Ok(())
    }

    // ==================== Resolution ====================

    /// Permissions granted to a user by this area alone.
    ///
    /// Members get the union of their roles; everyone else gets the public role.
    #[must_use]
    pub fn effective_permissions(&self, user: Uuid) -> PermissionSet {
        match self.members.get(&user) {
            Some(member) => member
                .roles
                .iter()
                .filter_map(|name| self.roles.get(name))
                .fold(PermissionSet::empty(), |acc, role| acc.union(role.permissions)),
            None => self.public_role.permissions,
        }
    }

    #[must_use]
    pub fn test_permission(&self, user: Uuid, permission: Permission) -> bool {
        self.effective_permissions(user).has(permission)
    }

    // ==================== Persistence ====================

    /// Write the shared area fields into `doc`.
    pub fn save(&self, doc: &mut Document) {
        doc.set("type", self.kind.key());
        doc.set("name", self.name.as_str());
        save_flags(
            doc.create_section("protections"),
            Protection::ALL.iter().map(|&p| (p.key(), self.protections.has(p))),
        );

        let roles = doc.create_section("roles");
        for role in std::iter::once(&self.public_role).chain(self.roles.values()) {
            let section = roles.create_section(role.name.as_str());
            save_flags(
                section.create_section("permissions"),
                Permission::ALL.iter().map(|&p| (p.key(), role.permissions.has(p))),
            );
        }

        let members = doc.create_section("members");
        for (id, member) in &self.members {
            let section = members.create_section(id.to_string());
            section.set("name", member.user.name());
            section.set(
                "roles",
                member.roles.iter().cloned().collect::<Vec<String>>(),
            );
        }
    }

    /// Read an area of the given kind from `doc`.
    ///
    /// Memberships are returned unresolved; pass them to [`Area::link_members`]
    /// once users can be looked up.
    pub fn load(doc: &Document, kind: AreaKind) -> Result<(Self, Vec<PendingMember>), DocumentError> {
        let found = doc.require_str("type")?;
        if AreaKind::from_key(found) != Some(kind) {
            return Err(DocumentError::InvalidValue {
                path: "type".into(),
                reason: format!("expected {kind}, found {found:?}"),
            });
        }

        let mut area = Self::new(doc.require_str("name")?, kind);
        if let Some(section) = doc.get_section("protections") {
            area.protections = load_flags(section, "protections", Protection::from_key)
                .into_iter()
                .collect();
        }

        if let Some(roles) = doc.get_section("roles") {
            for (name, _) in roles.iter() {
                let section = roles.require_section(name)?;
                let permissions: PermissionSet = section
                    .get_section("permissions")
                    .map(|p| load_flags(p, name, Permission::from_key).into_iter().collect())
                    .unwrap_or_default();

                let role = if is_public_name(name) {
                    &mut area.public_role
                } else {
                    area.roles
                        .entry(name.to_owned())
                        .or_insert_with(|| Role::new(name, false))
                };
                role.permissions = permissions;
            }
        }

        let mut pending = Vec::new();
        if let Some(members) = doc.get_section("members") {
            for (key, _) in members.iter() {
                let id = Uuid::parse_str(key).map_err(|e| DocumentError::InvalidValue {
                    path: format!("members.{key}"),
                    reason: e.to_string(),
                })?;
                let section = members.require_section(key)?;
                pending.push(PendingMember {
                    id,
                    name: section.require_str("name")?.to_owned(),
                    roles: section.string_list("roles")?,
                });
            }
        }

        area.dirty = false;
        Ok((area, pending))
    }

    /// Resolve loaded memberships into live members.
    ///
    /// Role names the area does not define are dropped with a warning.
    pub fn link_members(&mut self, pending: Vec<PendingMember>, users: &mut UserRegistry) {
        for entry in pending {
            let user = users.get_user(&Profile::new(entry.id, entry.name));
            let mut roles = BTreeSet::new();
            for role in entry.roles {
                if self.roles.contains_key(&role) {
                    roles.insert(role);
                } else {
                    tracing::warn!(
                        "{} {}: member {} refers to unknown role {role}",
                        self.kind,
                        self.name,
                        user.name()
                    );
                }
            }
            self.members.insert(user.id(), Member { user, roles });
        }
    }
}

fn is_public_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(PUBLIC_ROLE)
}

fn save_flags(section: &mut Document, flags: impl IntoIterator<Item = (&'static str, bool)>) {
    for (key, enabled) in flags {
        section.set(key, enabled);
    }
}

/// Kinds whose key is set to `true`. Unknown keys are logged and skipped.
fn load_flags<K>(section: &Document, owner: &str, from_key: impl Fn(&str) -> Option<K>) -> Vec<K> {
    let mut kinds = Vec::new();
    for key in section.keys() {
        match from_key(key) {
            Some(kind) if section.get_bool(key) => kinds.push(kind),
            Some(_) => {}
            None => tracing::warn!("{owner}: ignoring unknown flag {key}"),
        }
    }
    kinds
}
