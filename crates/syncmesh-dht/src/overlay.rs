//! The overlay contract.
//!
//! The routing, replication and storage of the structured overlay are
//! external to this crate; [`Overlay`] is the primitive surface the
//! protected-entry client depends on. Any conforming implementation
//! must enforce the receiver-side protection rules:
//!
//! 1. A put on an occupied tuple succeeds only if no protected entry
//!    exists there, or the incoming entry is signed by the stored
//!    owner.
//! 2. A rejected mutation leaves the stored value unchanged.
//! 3. Removing a protected entry requires a [`RemovalProof`] signed by
//!    the owner; a remove without a proof is rejected.
//! 4. A protection transfer applies to every version at the tuple or
//!    to none.

use crate::entry::signing_message;
use crate::{DhtError, EntryAddress, Key160, ProtectionKeys, SignedEntry};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Authorization to remove protected entries at a tuple.
///
/// The signature covers the `(location, domain, content)` prefix and
/// the half-open version range being removed; a single-version remove
/// uses the degenerate range `[version, version]`.
#[derive(Debug, Clone)]
pub struct RemovalProof {
    owner: VerifyingKey,
    signature: Signature,
}

impl RemovalProof {
    /// Signs a removal of the version range `[from, to)` (or the single
    /// version `from` when `from == to`).
    #[must_use]
    pub fn create(
        keys: &ProtectionKeys,
        location: Key160,
        domain: Key160,
        content: Key160,
        from: Key160,
        to: Key160,
    ) -> Self {
        Self {
            owner: keys.public(),
            signature: keys.sign(&removal_message(location, domain, content, from, to)),
        }
    }

    /// The key the proof claims to be from.
    #[must_use]
    pub fn owner(&self) -> &VerifyingKey {
        &self.owner
    }

    /// Verifies the proof for the given removal.
    ///
    /// # Errors
    ///
    /// [`DhtError::SignatureInvalid`] if the signature does not hold.
    pub fn verify(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        from: Key160,
        to: Key160,
    ) -> Result<(), DhtError> {
        self.owner
            .verify(
                &removal_message(location, domain, content, from, to),
                &self.signature,
            )
            .map_err(|_| DhtError::SignatureInvalid)
    }
}

fn removal_message(
    location: Key160,
    domain: Key160,
    content: Key160,
    from: Key160,
    to: Key160,
) -> Vec<u8> {
    let mut message = Vec::with_capacity(5 * crate::key::KEY_LENGTH + 7);
    message.extend_from_slice(b"remove:");
    message.extend_from_slice(location.as_bytes());
    message.extend_from_slice(domain.as_bytes());
    message.extend_from_slice(content.as_bytes());
    message.extend_from_slice(from.as_bytes());
    message.extend_from_slice(to.as_bytes());
    message
}

/// A protection-key transfer for every version at one tuple.
///
/// Carries no payload. The current owner authorizes the rebinding; the
/// new owner's per-version signatures (produced from the version
/// digests) become the stored bindings. The overlay applies the grant
/// atomically: if any live version is not covered, nothing changes.
#[derive(Debug, Clone)]
pub struct TransferGrant {
    new_owner: VerifyingKey,
    authorization: Signature,
    rebound: Vec<(Key160, Signature)>,
}

impl TransferGrant {
    /// Builds a grant from the current owner's authorization and the
    /// new owner's per-version signatures.
    #[must_use]
    pub fn new(
        current: &ProtectionKeys,
        new_owner: VerifyingKey,
        location: Key160,
        domain: Key160,
        content: Key160,
        rebound: Vec<(Key160, Signature)>,
    ) -> Self {
        Self {
            new_owner,
            authorization: current.sign(&grant_message(location, domain, content, &new_owner)),
            rebound,
        }
    }

    /// The key every version is rebound to.
    #[must_use]
    pub fn new_owner(&self) -> &VerifyingKey {
        &self.new_owner
    }

    /// Verifies the grant was authorized by `current` for this tuple.
    ///
    /// # Errors
    ///
    /// [`DhtError::SignatureInvalid`] if the authorization does not
    /// hold.
    pub fn verify_authorization(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        current: &VerifyingKey,
    ) -> Result<(), DhtError> {
        current
            .verify(
                &grant_message(location, domain, content, &self.new_owner),
                &self.authorization,
            )
            .map_err(|_| DhtError::SignatureInvalid)
    }

    /// The new-owner signature for one version, if covered.
    #[must_use]
    pub fn signature_for(&self, version: Key160) -> Option<&Signature> {
        self.rebound
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, s)| s)
    }
}

fn grant_message(
    location: Key160,
    domain: Key160,
    content: Key160,
    new_owner: &VerifyingKey,
) -> Vec<u8> {
    let mut message = Vec::with_capacity(3 * crate::key::KEY_LENGTH + 32 + 9);
    message.extend_from_slice(b"transfer:");
    message.extend_from_slice(location.as_bytes());
    message.extend_from_slice(domain.as_bytes());
    message.extend_from_slice(content.as_bytes());
    message.extend_from_slice(new_owner.as_bytes());
    message
}

/// Digest view of one stored version, as returned by
/// [`Overlay::digests`]. Enough to re-sign the version without its
/// payload.
#[derive(Debug, Clone)]
pub struct VersionDigest {
    /// The version key.
    pub version: Key160,
    /// SHA-256 of the stored payload.
    pub digest: [u8; 32],
    /// The version's lineage reference.
    pub based_on: Key160,
}

impl VersionDigest {
    /// The message a new owner signs to rebind this version.
    #[must_use]
    pub fn rebind_message(&self) -> Vec<u8> {
        signing_message(&self.digest, &self.based_on)
    }
}

/// Primitive operations of the structured overlay.
///
/// All operations are asynchronous; rejection, unreachability and
/// timeouts surface as [`DhtError`].
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Cheap reachability probe, for callers that guard before
    /// assembling work. Defaults to `true`; operations still surface
    /// [`DhtError::Unreachable`] when the probe was stale.
    fn is_connected(&self) -> bool {
        true
    }

    /// Stores an entry at the address, subject to the protection rules.
    async fn put(&self, address: EntryAddress, entry: SignedEntry) -> Result<(), DhtError>;

    /// Fetches the entry at the exact address.
    async fn get(&self, address: &EntryAddress) -> Result<Option<SignedEntry>, DhtError>;

    /// Fetches the most recently stored version at a tuple, with its
    /// version key.
    async fn get_latest(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
    ) -> Result<Option<(Key160, SignedEntry)>, DhtError>;

    /// Removes the entry at the address. Protected entries require a
    /// proof from the bound owner.
    async fn remove(
        &self,
        address: &EntryAddress,
        proof: Option<RemovalProof>,
    ) -> Result<(), DhtError>;

    /// Removes every version in the half-open range `[from, to)`.
    /// Returns the number of removed versions.
    async fn remove_range(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        from: Key160,
        to: Key160,
        proof: Option<RemovalProof>,
    ) -> Result<usize, DhtError>;

    /// Lists digest views of every version at a tuple.
    async fn digests(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
    ) -> Result<Vec<VersionDigest>, DhtError>;

    /// Atomically rebinds every version at a tuple to the grant's new
    /// owner.
    async fn transfer(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        grant: TransferGrant,
    ) -> Result<(), DhtError>;
}
