//! Identifier types for syncmesh.
//!
//! All identifiers are UUID-based. Process components get random v4
//! identities; user identifiers are derived deterministically from the
//! user name via UUID v5 so the same name maps to the same id on every
//! peer.

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

/// Namespace UUID for deterministic UUID v5 generation.
const SYNCMESH_NAMESPACE: Uuid = uuid!("7c9e4f12-55ab-4f0e-9d31-8aa1c2f0be64");

/// Identifier for a process component.
///
/// Assigned once on construction and stable across all state
/// transitions. Equality and ordering among process components is by
/// this identity alone.
///
/// # Example
///
/// ```
/// use syncmesh_types::ProcessId;
///
/// let id = ProcessId::new();
/// println!("Process: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub Uuid);

#[allow(clippy::new_without_default)] // Default intentionally not implemented - an id is always minted by the component constructor
impl ProcessId {
    /// Creates a new [`ProcessId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proc:{}", self.0)
    }
}

/// Identifier for a user of the synchronization network.
///
/// Derived deterministically from the user name (UUID v5) so that all
/// peers agree on the id without coordination.
///
/// # Example
///
/// ```
/// use syncmesh_types::UserId;
///
/// let a = UserId::from_name("alice");
/// let b = UserId::from_name("alice");
/// assert_eq!(a, b);
/// assert_eq!(a.name(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId {
    /// Deterministic UUID derived from the name.
    pub uuid: Uuid,
    /// Human-readable user name.
    pub name: String,
}

impl UserId {
    /// Creates a [`UserId`] from a user name.
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uuid: Uuid::new_v5(&SYNCMESH_NAMESPACE, name.as_bytes()),
            name,
        }
    }

    /// Returns the user name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_id_display_prefix() {
        let id = ProcessId::new();
        assert!(id.to_string().starts_with("proc:"));
    }

    #[test]
    fn process_id_ordering_is_stable() {
        let a = ProcessId::new();
        let b = ProcessId::new();
        // Whatever the order, it is consistent both ways.
        assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn user_id_same_name_same_uuid() {
        let a = UserId::from_name("dave");
        let b = UserId::from_name("dave");
        assert_eq!(a.uuid, b.uuid);
    }

    #[test]
    fn user_id_different_names_different_uuid() {
        assert_ne!(
            UserId::from_name("dave").uuid,
            UserId::from_name("erin").uuid
        );
    }

    #[test]
    fn user_id_display() {
        assert_eq!(UserId::from_name("dave").to_string(), "user:dave");
    }
}
