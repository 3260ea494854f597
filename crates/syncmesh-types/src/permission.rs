//! Permission types for shared folders.
//!
//! When a folder is shared with another user, the grant carries a
//! [`PermissionType`] describing what the other user may do inside
//! the shared subtree.

use serde::{Deserialize, Serialize};

/// What a user is allowed to do with a shared folder.
///
/// | Variant | May read | May modify |
/// |---------|----------|------------|
/// | `Read`  | Yes      | No         |
/// | `Write` | Yes      | Yes        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionType {
    /// Read-only access to the shared subtree.
    Read,
    /// Full read/write access to the shared subtree.
    Write,
}

impl PermissionType {
    /// Returns `true` if this permission allows modification.
    #[must_use]
    pub fn can_write(&self) -> bool {
        matches!(self, Self::Write)
    }
}

impl std::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// A permission granted to a specific user.
///
/// # Example
///
/// ```
/// use syncmesh_types::{PermissionType, UserPermission};
///
/// let grant = UserPermission::new("bob", PermissionType::Read);
/// assert_eq!(grant.user_name, "bob");
/// assert!(!grant.permission.can_write());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    /// Name of the user the permission is granted to.
    pub user_name: String,
    /// What the user may do.
    pub permission: PermissionType,
}

impl UserPermission {
    /// Creates a new grant.
    #[must_use]
    pub fn new(user_name: impl Into<String>, permission: PermissionType) -> Self {
        Self {
            user_name: user_name.into(),
            permission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_can_write() {
        assert!(PermissionType::Write.can_write());
        assert!(!PermissionType::Read.can_write());
    }

    #[test]
    fn permission_display() {
        assert_eq!(PermissionType::Read.to_string(), "read");
        assert_eq!(PermissionType::Write.to_string(), "write");
    }

    #[test]
    fn user_permission_new() {
        let grant = UserPermission::new("carol", PermissionType::Write);
        assert_eq!(grant.user_name, "carol");
        assert_eq!(grant.permission, PermissionType::Write);
    }
}
