//! Overlay addressing scheme of the file layer.
//!
//! All file-layer values live in one domain. Locations separate the
//! kinds of data:
//!
//! | Value | Location | Content key |
//! |-------|----------|-------------|
//! | User profile | `profile:<user>` hash | `user-profile` hash |
//! | Meta document | per-file random key | `meta-document` hash |
//! | Chunk | derived from meta location, version, index | `chunk` hash |
//!
//! Meta documents and profiles are version-chained; chunks are
//! immutable single-version values.

use syncmesh_dht::Key160;
use syncmesh_types::UserId;

/// The shared domain key of the file layer.
#[must_use]
pub fn domain_key() -> Key160 {
    Key160::hash("syncmesh-files")
}

/// Content key of user profiles.
#[must_use]
pub fn profile_content() -> Key160 {
    Key160::hash("user-profile")
}

/// Content key of meta documents.
#[must_use]
pub fn meta_content() -> Key160 {
    Key160::hash("meta-document")
}

/// Content key of chunks.
#[must_use]
pub fn chunk_content() -> Key160 {
    Key160::hash("chunk")
}

/// Location of a user's profile.
#[must_use]
pub fn profile_location(user: &UserId) -> Key160 {
    Key160::hash(format!("profile:{}", user.name()))
}

/// Location of one chunk of one file version.
#[must_use]
pub fn chunk_location(meta_location: Key160, version_index: u32, chunk_index: u32) -> Key160 {
    let mut seed = Vec::with_capacity(20 + 8 + 6);
    seed.extend_from_slice(b"chunk:");
    seed.extend_from_slice(meta_location.as_bytes());
    seed.extend_from_slice(&version_index.to_be_bytes());
    seed.extend_from_slice(&chunk_index.to_be_bytes());
    Key160::hash(seed)
}

/// The version key of the successor of `previous` carrying `payload`.
///
/// Content-addressed: the same predecessor and payload always map to
/// the same version key, so a repeated identical put is idempotent.
#[must_use]
pub fn next_version(previous: Key160, payload: &[u8]) -> Key160 {
    let mut seed = Vec::with_capacity(20 + payload.len() + 8);
    seed.extend_from_slice(b"version:");
    seed.extend_from_slice(previous.as_bytes());
    seed.extend_from_slice(payload);
    Key160::hash(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_location_is_per_user() {
        let alice = profile_location(&UserId::from_name("alice"));
        let bob = profile_location(&UserId::from_name("bob"));
        assert_ne!(alice, bob);
        assert_eq!(alice, profile_location(&UserId::from_name("alice")));
    }

    #[test]
    fn chunk_locations_are_distinct() {
        let meta = Key160::hash("meta");
        assert_ne!(chunk_location(meta, 0, 0), chunk_location(meta, 0, 1));
        assert_ne!(chunk_location(meta, 0, 0), chunk_location(meta, 1, 0));
        assert_ne!(
            chunk_location(meta, 0, 0),
            chunk_location(Key160::hash("other"), 0, 0)
        );
    }

    #[test]
    fn version_chain_is_content_addressed() {
        let root = next_version(Key160::ZERO, b"payload");
        assert_eq!(root, next_version(Key160::ZERO, b"payload"));
        assert_ne!(root, next_version(Key160::ZERO, b"other"));
        assert_ne!(root, next_version(root, b"payload"));
    }
}
