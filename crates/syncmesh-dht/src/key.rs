//! 160-bit keys and entry addresses.
//!
//! Every value in the overlay is addressed by a tuple of four
//! fixed-width 160-bit keys: `(location, domain, content, version)`.
//! Keys are derived by hashing (the first 20 bytes of SHA-256), and
//! the all-zero key is the sentinel "root version" for lineage chains.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width of an overlay key in bytes (160 bits).
pub const KEY_LENGTH: usize = 20;

/// A fixed-width 160-bit overlay key.
///
/// Ordering is byte-lexicographic, which is what version-range removal
/// relies on.
///
/// # Example
///
/// ```
/// use syncmesh_dht::Key160;
///
/// let a = Key160::hash("location");
/// let b = Key160::hash("location");
/// assert_eq!(a, b);
/// assert_ne!(a, Key160::hash("domain"));
/// assert!(Key160::ZERO.is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key160([u8; KEY_LENGTH]);

impl Key160 {
    /// The sentinel key: all zeroes. As a `based_on` reference it
    /// marks a root version.
    pub const ZERO: Key160 = Key160([0u8; KEY_LENGTH]);

    /// Derives a key by hashing arbitrary bytes (first 20 bytes of
    /// SHA-256).
    #[must_use]
    pub fn hash(data: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(data.as_ref());
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&digest[..KEY_LENGTH]);
        Self(key)
    }

    /// Constructs a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Returns `true` for the sentinel zero key.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl std::fmt::Display for Key160 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The full address of one overlay value.
///
/// `location` routes to the responsible peers, `domain` partitions a
/// location, `content` names the value and `version` selects one entry
/// of its version graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryAddress {
    /// Routing key.
    pub location: Key160,
    /// Domain partition within the location.
    pub domain: Key160,
    /// Content key within the domain.
    pub content: Key160,
    /// Version key; [`Key160::ZERO`] for unversioned values.
    pub version: Key160,
}

impl EntryAddress {
    /// Creates a fully qualified address.
    #[must_use]
    pub fn new(location: Key160, domain: Key160, content: Key160, version: Key160) -> Self {
        Self {
            location,
            domain,
            content,
            version,
        }
    }

    /// Creates an unversioned address (`version = ZERO`).
    #[must_use]
    pub fn unversioned(location: Key160, domain: Key160, content: Key160) -> Self {
        Self::new(location, domain, content, Key160::ZERO)
    }

    /// The `(location, domain, content)` prefix shared by all versions
    /// of one value.
    #[must_use]
    pub fn tuple(&self) -> (Key160, Key160, Key160) {
        (self.location, self.domain, self.content)
    }
}

impl std::fmt::Display for EntryAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.location, self.domain, self.content, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(Key160::hash("content"), Key160::hash("content"));
        assert_ne!(Key160::hash("content"), Key160::hash("content2"));
    }

    #[test]
    fn zero_sentinel() {
        assert!(Key160::ZERO.is_zero());
        assert!(!Key160::hash("x").is_zero());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let low = Key160::from_bytes([0x01; KEY_LENGTH]);
        let high = Key160::from_bytes([0x02; KEY_LENGTH]);
        assert!(low < high);

        let mut mixed = [0x01; KEY_LENGTH];
        mixed[KEY_LENGTH - 1] = 0xFF;
        assert!(Key160::from_bytes(mixed) < high);
    }

    #[test]
    fn display_is_hex() {
        let key = Key160::from_bytes([0xAB; KEY_LENGTH]);
        assert_eq!(key.to_string(), "ab".repeat(KEY_LENGTH));
    }

    #[test]
    fn address_tuple_ignores_version() {
        let a = EntryAddress::new(
            Key160::hash("l"),
            Key160::hash("d"),
            Key160::hash("c"),
            Key160::hash("v1"),
        );
        let b = EntryAddress::new(
            Key160::hash("l"),
            Key160::hash("d"),
            Key160::hash("c"),
            Key160::hash("v2"),
        );
        assert_eq!(a.tuple(), b.tuple());
        assert_ne!(a, b);
    }

    #[test]
    fn unversioned_uses_zero() {
        let addr = EntryAddress::unversioned(Key160::hash("l"), Key160::hash("d"), Key160::hash("c"));
        assert!(addr.version.is_zero());
    }
}
