//! Typed façade over the overlay: sign-on-put, verify-on-get,
//! version-key lineage and protection transfer.
//!
//! The client owns nothing but a handle to the overlay and its
//! configuration. Its job is discipline: every protected put is signed
//! before it leaves the process, every get is verified before its
//! payload is trusted, removals carry signed proofs, and a protection
//! transfer is assembled so the overlay can apply it atomically.
//!
//! # Version Lineage
//!
//! Versions at one tuple form a DAG rooted at the sentinel
//! [`Key160::ZERO`]: every put names the version it is based on. The
//! signature covers the payload digest *and* that lineage reference,
//! so neither can be tampered with independently.

use crate::overlay::{Overlay, RemovalProof, TransferGrant};
use crate::{DhtError, EntryAddress, Key160, ProtectionKeys, SignedEntry};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Requested lifetime for stored entries. `None` means no expiry
    /// request.
    pub ttl: Option<Duration>,
}

impl ClientConfig {
    /// Sets the requested entry lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Typed client for protected overlay entries.
pub struct ProtectedEntryClient {
    overlay: Arc<dyn Overlay>,
    config: ClientConfig,
}

impl ProtectedEntryClient {
    /// Creates a client with default configuration.
    #[must_use]
    pub fn new(overlay: Arc<dyn Overlay>) -> Self {
        Self::with_config(overlay, ClientConfig::default())
    }

    /// Creates a client with explicit configuration.
    #[must_use]
    pub fn with_config(overlay: Arc<dyn Overlay>, config: ClientConfig) -> Self {
        Self { overlay, config }
    }

    /// The underlying overlay handle.
    #[must_use]
    pub fn overlay(&self) -> &Arc<dyn Overlay> {
        &self.overlay
    }

    /// Stores a signed, protected entry.
    ///
    /// `based_on` names the predecessor version ([`Key160::ZERO`] for a
    /// root). Succeeds iff the tuple is unoccupied or already bound to
    /// `owner`'s public key.
    ///
    /// # Errors
    ///
    /// [`DhtError::Rejected`] when the receiver's protection check
    /// refuses the mutation; the stored value is then unchanged.
    pub async fn put(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        version: Key160,
        based_on: Key160,
        payload: Bytes,
        owner: &ProtectionKeys,
    ) -> Result<(), DhtError> {
        let entry = SignedEntry::sign(payload, based_on, self.config.ttl, owner);
        let address = EntryAddress::new(location, domain, content, version);
        debug!("put {} ({} bytes, protected)", address, entry.payload().len());
        self.overlay.put(address, entry).await
    }

    /// Stores an unsigned, unprotected entry.
    ///
    /// Fails against a tuple already bound to a protection key - which
    /// is exactly what the protection contract promises.
    pub async fn put_unsigned(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        version: Key160,
        payload: Bytes,
    ) -> Result<(), DhtError> {
        let entry = SignedEntry::unsigned(payload, Key160::ZERO, self.config.ttl);
        let address = EntryAddress::new(location, domain, content, version);
        debug!("put {} ({} bytes, unsigned)", address, entry.payload().len());
        self.overlay.put(address, entry).await
    }

    /// Fetches and verifies the entry at an exact version.
    ///
    /// The stored signature is checked against the entry's own bound
    /// owner; callers holding an expected key can additionally use
    /// [`SignedEntry::verify_with`].
    ///
    /// # Errors
    ///
    /// [`DhtError::SignatureInvalid`] if the stored entry does not
    /// verify.
    pub async fn get(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        version: Key160,
    ) -> Result<Option<SignedEntry>, DhtError> {
        let address = EntryAddress::new(location, domain, content, version);
        let Some(entry) = self.overlay.get(&address).await? else {
            return Ok(None);
        };
        entry.verify()?;
        Ok(Some(entry))
    }

    /// Fetches and verifies the most recent version at a tuple.
    pub async fn get_latest(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
    ) -> Result<Option<(Key160, SignedEntry)>, DhtError> {
        let Some((version, entry)) = self.overlay.get_latest(location, domain, content).await?
        else {
            return Ok(None);
        };
        entry.verify()?;
        Ok(Some((version, entry)))
    }

    /// Removes one version, authorized by the owner keypair.
    pub async fn remove(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        version: Key160,
        owner: &ProtectionKeys,
    ) -> Result<(), DhtError> {
        let proof = RemovalProof::create(owner, location, domain, content, version, version);
        let address = EntryAddress::new(location, domain, content, version);
        self.overlay.remove(&address, Some(proof)).await
    }

    /// Attempts a removal without presenting any keypair.
    ///
    /// On a protected entry this is rejected by the overlay - an
    /// unauthenticated peer cannot delete someone else's data.
    pub async fn remove_without_proof(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        version: Key160,
    ) -> Result<(), DhtError> {
        let address = EntryAddress::new(location, domain, content, version);
        self.overlay.remove(&address, None).await
    }

    /// Removes every version in the half-open range `[from, to)`.
    /// Returns the number of removed versions.
    pub async fn remove_range(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        from: Key160,
        to: Key160,
        owner: &ProtectionKeys,
    ) -> Result<usize, DhtError> {
        let proof = RemovalProof::create(owner, location, domain, content, from, to);
        self.overlay
            .remove_range(location, domain, content, from, to, Some(proof))
            .await
    }

    /// Transfers protection of every version at a tuple from
    /// `current` to `new`.
    ///
    /// A meta-only operation: the current owner authorizes the
    /// rebinding, the new owner re-signs each stored version from its
    /// digest, and the overlay applies the grant atomically. Afterwards
    /// the old key can no longer modify or remove anything at the
    /// tuple.
    ///
    /// # Errors
    ///
    /// - [`DhtError::NotFound`] if nothing is stored at the tuple.
    /// - [`DhtError::Rejected`] if the tuple is bound to a different
    ///   key, or a concurrent put changed the live version set (retry
    ///   after refreshing).
    pub async fn transfer_protection(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        current: &ProtectionKeys,
        new: &ProtectionKeys,
    ) -> Result<(), DhtError> {
        let digests = self.overlay.digests(location, domain, content).await?;
        if digests.is_empty() {
            return Err(DhtError::NotFound);
        }

        let rebound = digests
            .iter()
            .map(|digest| (digest.version, new.sign(&digest.rebind_message())))
            .collect();
        let grant = TransferGrant::new(current, new.public(), location, domain, content, rebound);

        debug!(
            "transferring protection of {}/{}/{} ({} versions)",
            location,
            domain,
            content,
            digests.len()
        );
        self.overlay.transfer(location, domain, content, grant).await
    }
}

impl std::fmt::Debug for ProtectedEntryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedEntryClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryOverlay;

    fn client() -> (ProtectedEntryClient, Arc<MemoryOverlay>) {
        let overlay = Arc::new(MemoryOverlay::new());
        (
            ProtectedEntryClient::new(Arc::clone(&overlay) as Arc<dyn Overlay>),
            overlay,
        )
    }

    fn tuple() -> (Key160, Key160, Key160) {
        (
            Key160::hash("location"),
            Key160::hash("domain"),
            Key160::hash("content"),
        )
    }

    #[tokio::test]
    async fn protected_put_then_get_verifies_under_owner() {
        let (client, _) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"data"), &keys)
            .await
            .expect("initial put");

        let entry = client.get(l, d, c, Key160::ZERO).await.unwrap().expect("entry");
        assert_eq!(entry.payload().as_ref(), b"data");
        entry.verify_with(&keys.public()).expect("verifies under owner");
    }

    #[tokio::test]
    async fn unsigned_put_cannot_overwrite_protected_entry() {
        let (client, _) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"data"), &keys)
            .await
            .unwrap();

        let err = client
            .put_unsigned(l, d, c, Key160::ZERO, Bytes::from_static(b"data2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DhtError::Rejected(_)));

        // The stored value is unchanged and still verifies.
        let entry = client.get(l, d, c, Key160::ZERO).await.unwrap().expect("entry");
        assert_eq!(entry.payload().as_ref(), b"data");
        entry.verify_with(&keys.public()).expect("still bound to owner");
    }

    #[tokio::test]
    async fn foreign_key_put_is_rejected_and_value_preserved() {
        let (client, _) = client();
        let k1 = ProtectionKeys::generate();
        let k2 = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"entry"), &k1)
            .await
            .unwrap();

        let err = client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"intruder"), &k2)
            .await
            .unwrap_err();
        assert!(matches!(err, DhtError::Rejected(_)));

        let entry = client.get(l, d, c, Key160::ZERO).await.unwrap().expect("entry");
        assert_eq!(entry.payload().as_ref(), b"entry");
        entry.verify_with(&k1.public()).expect("still the first owner");
        assert!(entry.verify_with(&k2.public()).is_err());
    }

    #[tokio::test]
    async fn same_owner_overwrite_succeeds() {
        let (client, _) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"old"), &keys)
            .await
            .unwrap();
        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"new"), &keys)
            .await
            .expect("owner may overwrite");

        let entry = client.get(l, d, c, Key160::ZERO).await.unwrap().expect("entry");
        assert_eq!(entry.payload().as_ref(), b"new");
    }

    #[tokio::test]
    async fn versioned_put_records_lineage() {
        let (client, _) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();
        let v1 = Key160::hash("version-1");
        let v2 = Key160::hash("version-2");

        client
            .put(l, d, c, v1, Key160::ZERO, Bytes::from_static(b"first"), &keys)
            .await
            .unwrap();
        client
            .put(l, d, c, v2, v1, Bytes::from_static(b"second"), &keys)
            .await
            .unwrap();

        let first = client.get(l, d, c, v1).await.unwrap().expect("v1");
        assert!(first.based_on().is_zero());

        let second = client.get(l, d, c, v2).await.unwrap().expect("v2");
        assert_eq!(second.based_on(), v1);

        let (latest_version, latest) = client.get_latest(l, d, c).await.unwrap().expect("latest");
        assert_eq!(latest_version, v2);
        assert_eq!(latest.payload().as_ref(), b"second");
    }

    #[tokio::test]
    async fn remove_without_proof_is_rejected_on_protected_entry() {
        let (client, _) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"data"), &keys)
            .await
            .unwrap();

        let err = client
            .remove_without_proof(l, d, c, Key160::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, DhtError::Rejected(_)));
        assert!(client.get(l, d, c, Key160::ZERO).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_requires_the_bound_owner() {
        let (client, _) = client();
        let k1 = ProtectionKeys::generate();
        let k2 = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"data"), &k1)
            .await
            .unwrap();

        let err = client.remove(l, d, c, Key160::ZERO, &k2).await.unwrap_err();
        assert!(matches!(err, DhtError::Rejected(_)));
        assert!(client.get(l, d, c, Key160::ZERO).await.unwrap().is_some());

        client.remove(l, d, c, Key160::ZERO, &k1).await.expect("owner removes");
        assert!(client.get(l, d, c, Key160::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_range_is_half_open() {
        let (client, _) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        let v1 = Key160::from_bytes([0x10; 20]);
        let v2 = Key160::from_bytes([0x20; 20]);
        let v3 = Key160::from_bytes([0x30; 20]);
        for (version, based_on) in [(v1, Key160::ZERO), (v2, v1), (v3, v2)] {
            client
                .put(l, d, c, version, based_on, Bytes::from_static(b"v"), &keys)
                .await
                .unwrap();
        }

        let removed = client.remove_range(l, d, c, v1, v3, &keys).await.unwrap();
        assert_eq!(removed, 2);

        assert!(client.get(l, d, c, v1).await.unwrap().is_none());
        assert!(client.get(l, d, c, v2).await.unwrap().is_none());
        assert!(client.get(l, d, c, v3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transfer_rebinds_every_version_to_the_new_owner() {
        let (client, _) = client();
        let k1 = ProtectionKeys::generate();
        let k2 = ProtectionKeys::generate();
        let (l, d, c) = tuple();
        let v1 = Key160::hash("v1");
        let v2 = Key160::hash("v2");

        client
            .put(l, d, c, v1, Key160::ZERO, Bytes::from_static(b"first"), &k1)
            .await
            .unwrap();
        client
            .put(l, d, c, v2, v1, Bytes::from_static(b"second"), &k1)
            .await
            .unwrap();

        client
            .transfer_protection(l, d, c, &k1, &k2)
            .await
            .expect("transfer succeeds");

        // Every version verifies under the new key and none under the old.
        for version in [v1, v2] {
            let entry = client.get(l, d, c, version).await.unwrap().expect("entry");
            entry.verify_with(&k2.public()).expect("bound to new owner");
            assert!(entry.verify_with(&k1.public()).is_err());
        }

        // The new owner can modify; the old owner no longer can.
        client
            .put(l, d, c, Key160::hash("v3"), v2, Bytes::from_static(b"third"), &k2)
            .await
            .expect("new owner writes");
        let err = client
            .put(l, d, c, Key160::hash("v4"), v2, Bytes::from_static(b"stale"), &k1)
            .await
            .unwrap_err();
        assert!(matches!(err, DhtError::Rejected(_)));
    }

    #[tokio::test]
    async fn transfer_of_missing_tuple_is_not_found() {
        let (client, _) = client();
        let k1 = ProtectionKeys::generate();
        let k2 = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        let err = client.transfer_protection(l, d, c, &k1, &k2).await.unwrap_err();
        assert!(matches!(err, DhtError::NotFound));
    }

    #[tokio::test]
    async fn partial_transfer_grant_changes_nothing() {
        let (client, overlay) = client();
        let k1 = ProtectionKeys::generate();
        let k2 = ProtectionKeys::generate();
        let (l, d, c) = tuple();
        let v1 = Key160::hash("v1");
        let v2 = Key160::hash("v2");

        client
            .put(l, d, c, v1, Key160::ZERO, Bytes::from_static(b"first"), &k1)
            .await
            .unwrap();
        client
            .put(l, d, c, v2, v1, Bytes::from_static(b"second"), &k1)
            .await
            .unwrap();

        // A grant covering only v1: rejected, atomically.
        let digests = overlay.digests(l, d, c).await.unwrap();
        let covered = digests
            .iter()
            .filter(|digest| digest.version == v1)
            .map(|digest| (digest.version, k2.sign(&digest.rebind_message())))
            .collect();
        let grant = TransferGrant::new(&k1, k2.public(), l, d, c, covered);

        let err = overlay.transfer(l, d, c, grant).await.unwrap_err();
        assert!(matches!(err, DhtError::Rejected(_)));

        // Both versions still bound to the original owner.
        for version in [v1, v2] {
            let entry = client.get(l, d, c, version).await.unwrap().expect("entry");
            entry.verify_with(&k1.public()).expect("unchanged");
        }
    }

    #[tokio::test]
    async fn operations_surface_unreachable_overlay() {
        let (client, overlay) = client();
        let keys = ProtectionKeys::generate();
        let (l, d, c) = tuple();

        overlay.set_connected(false);
        let err = client
            .put(l, d, c, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"data"), &keys)
            .await
            .unwrap_err();
        assert!(matches!(err, DhtError::Unreachable));
    }
}
