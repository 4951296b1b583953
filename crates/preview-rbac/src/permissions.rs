//! # Permissions
//!
//! Permission types, permission sets, and the grants a preview session needs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::actions::Action;
use crate::resources::{ResourceDescriptor, ResourceType};

/// A permission is a combination of resource type and action.
///
/// # Example
///
/// ```
/// use preview_rbac::permissions::Permission;
/// use preview_rbac::resources::ResourceType;
/// use preview_rbac::actions::Action;
///
/// let perm = Permission::new(ResourceType::PreviewUrlSecret, Action::Create);
/// assert_eq!(perm.to_string(), "preview_url_secret:create");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    /// The resource type this permission applies to.
    pub resource: ResourceType,
    /// The action allowed on the resource.
    pub action: Action,
}

impl Permission {
    /// Create a new permission.
    pub fn new(resource: ResourceType, action: Action) -> Self {
        Self { resource, action }
    }

    /// Parse from string (e.g., "preview_url_secret:create").
    ///
    /// # Returns
    ///
    /// `Some(Permission)` if valid, `None` otherwise
    pub fn from_string(s: &str) -> Option<Self> {
        let (resource, action) = s.split_once(':')?;
        Some(Self {
            resource: ResourceType::parse(resource)?,
            action: Action::parse(action)?,
        })
    }

    /// Check if holding this permission grants `other`.
    ///
    /// Resource types must match; the action must match or imply the other.
    pub fn matches(&self, other: &Permission) -> bool {
        self.resource == other.resource
            && (self.action == other.action || self.action.implies(other.action))
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

/// A set of permissions held by the current user.
///
/// # Example
///
/// ```
/// use preview_rbac::permissions::{Permission, PermissionSet};
/// use preview_rbac::resources::ResourceType;
/// use preview_rbac::actions::Action;
///
/// let mut set = PermissionSet::new();
/// set.add(Permission::new(ResourceType::PreviewAccessSharing, Action::Update));
///
/// // Update implies Read
/// assert!(set.has(&Permission::new(ResourceType::PreviewAccessSharing, Action::Read)));
/// assert!(!set.has(&Permission::new(ResourceType::PreviewAccessSharing, Action::Create)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: HashSet<Permission>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding every grant a preview session checks.
    pub fn all_preview_grants() -> Self {
        let mut set = Self::new();
        set.add_all(GrantKind::ALL.iter().map(|grant| grant.permission()));
        set
    }

    /// Add a permission to the set.
    pub fn add(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Add multiple permissions to the set.
    pub fn add_all<I>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = Permission>,
    {
        self.permissions.extend(permissions);
    }

    /// Remove a permission from the set.
    ///
    /// # Returns
    ///
    /// `true` if the permission was present, `false` otherwise
    pub fn remove(&mut self, permission: &Permission) -> bool {
        self.permissions.remove(permission)
    }

    /// Check if the set grants a permission, directly or by implication.
    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions.iter().any(|held| held.matches(permission))
    }

    /// Number of permissions held directly.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

/// The four grants a preview session depends on.
///
/// They are checked independently and concurrently; each one has its own
/// slot in the resolution context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    /// Read the shared preview secret.
    ReadShareAccess,
    /// Create the share-access singleton (enable sharing).
    CreateShareAccess,
    /// Update the share-access singleton (toggle sharing).
    UpdateShareAccess,
    /// Issue short-lived preview URL secrets.
    CreatePreviewSecret,
}

impl GrantKind {
    /// Every grant, in the order they are subscribed to.
    pub const ALL: [GrantKind; 4] = [
        GrantKind::ReadShareAccess,
        GrantKind::CreateShareAccess,
        GrantKind::UpdateShareAccess,
        GrantKind::CreatePreviewSecret,
    ];

    /// The action being checked.
    pub fn action(&self) -> Action {
        match self {
            GrantKind::ReadShareAccess => Action::Read,
            GrantKind::CreateShareAccess | GrantKind::CreatePreviewSecret => Action::Create,
            GrantKind::UpdateShareAccess => Action::Update,
        }
    }

    /// The resource type being checked.
    pub fn resource(&self) -> ResourceType {
        match self {
            GrantKind::CreatePreviewSecret => ResourceType::PreviewUrlSecret,
            _ => ResourceType::PreviewAccessSharing,
        }
    }

    /// The permission equivalent of this grant.
    pub fn permission(&self) -> Permission {
        Permission::new(self.resource(), self.action())
    }

    /// The document the grant is checked against.
    pub fn resource_descriptor(&self) -> ResourceDescriptor {
        match self.resource() {
            ResourceType::PreviewAccessSharing => ResourceDescriptor::share_access_singleton(),
            ResourceType::PreviewUrlSecret => ResourceDescriptor::new_preview_secret(),
        }
    }

    /// Get the string representation of the grant.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::ReadShareAccess => "read_share_access",
            GrantKind::CreateShareAccess => "create_share_access",
            GrantKind::UpdateShareAccess => "update_share_access",
            GrantKind::CreatePreviewSecret => "create_preview_secret",
        }
    }
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheckResult {
    /// Whether the permission is granted.
    pub granted: bool,
    /// Human readable explanation.
    pub reason: String,
}

impl PermissionCheckResult {
    /// A granted result.
    pub fn granted(reason: impl Into<String>) -> Self {
        Self {
            granted: true,
            reason: reason.into(),
        }
    }

    /// A denied result.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_string_round_trip() {
        let perm = Permission::new(ResourceType::PreviewAccessSharing, Action::Update);
        assert_eq!(perm.to_string(), "preview_access_sharing:update");
        assert_eq!(Permission::from_string(&perm.to_string()), Some(perm));
        assert_eq!(Permission::from_string("nonsense"), None);
        assert_eq!(Permission::from_string("preview_url_secret:fly"), None);
    }

    #[test]
    fn test_permission_matches_by_implication() {
        let manage = Permission::new(ResourceType::PreviewUrlSecret, Action::Manage);
        let create = Permission::new(ResourceType::PreviewUrlSecret, Action::Create);
        let other = Permission::new(ResourceType::PreviewAccessSharing, Action::Create);

        assert!(manage.matches(&create));
        assert!(!create.matches(&manage));
        assert!(!manage.matches(&other));
    }

    #[test]
    fn test_permission_set() {
        let mut set = PermissionSet::new();
        assert!(set.is_empty());

        set.add(Permission::new(ResourceType::PreviewUrlSecret, Action::Create));
        assert_eq!(set.len(), 1);
        assert!(set.has(&GrantKind::CreatePreviewSecret.permission()));
        assert!(!set.has(&GrantKind::ReadShareAccess.permission()));

        assert!(set.remove(&Permission::new(ResourceType::PreviewUrlSecret, Action::Create)));
        assert!(!set.has(&GrantKind::CreatePreviewSecret.permission()));
    }

    #[test]
    fn test_all_preview_grants() {
        let set = PermissionSet::all_preview_grants();
        for grant in GrantKind::ALL {
            assert!(set.has(&grant.permission()), "missing {grant}");
        }
    }

    #[test]
    fn test_grant_kinds() {
        assert_eq!(GrantKind::ReadShareAccess.action(), Action::Read);
        assert_eq!(GrantKind::UpdateShareAccess.action(), Action::Update);
        assert_eq!(
            GrantKind::CreatePreviewSecret.resource(),
            ResourceType::PreviewUrlSecret
        );
        assert_eq!(
            GrantKind::CreateShareAccess.resource_descriptor(),
            ResourceDescriptor::share_access_singleton()
        );
    }
}
