//! In-process overlay.
//!
//! A single-process [`Overlay`] implementation with the full
//! receiver-side protection semantics. It backs the test suites of
//! this workspace and local single-node operation; a networked overlay
//! replaces it without touching the client.
//!
//! # Semantics
//!
//! - A put on a tuple protected by key `K` succeeds only when the
//!   incoming entry is signed by `K`; anything else is rejected with
//!   the stored value unchanged.
//! - A remove of a protected tuple requires a valid
//!   [`RemovalProof`](crate::RemovalProof) from `K`; a remove without a
//!   proof is rejected.
//! - A protection transfer rebinds every version at the tuple or none.
//! - `set_connected(false)` simulates an unreachable overlay.

use crate::overlay::{Overlay, RemovalProof, TransferGrant, VersionDigest};
use crate::{DhtError, EntryAddress, Key160, SignedEntry};
use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

type TupleKey = (Key160, Key160, Key160);

struct Stored {
    entry: SignedEntry,
    seq: u64,
}

/// In-memory overlay with receiver-side protection checks.
#[derive(Default)]
pub struct MemoryOverlay {
    state: RwLock<HashMap<TupleKey, BTreeMap<Key160, Stored>>>,
    seq: AtomicU64,
    disconnected: AtomicBool,
}

impl MemoryOverlay {
    /// Creates an empty, connected overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates connectivity loss (or recovery).
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::Release);
    }

    /// Returns `true` while the overlay is reachable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::Acquire)
    }

    /// Number of stored versions across all tuples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_connected(&self) -> Result<(), DhtError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DhtError::Unreachable)
        }
    }
}

/// The key protecting a tuple: the owner of any stored protected
/// entry. Puts and transfers keep all versions bound to one key, so
/// the first hit is authoritative.
fn tuple_owner(versions: &BTreeMap<Key160, Stored>) -> Option<VerifyingKey> {
    versions
        .values()
        .find_map(|stored| stored.entry.owner().copied())
}

#[async_trait]
impl Overlay for MemoryOverlay {
    fn is_connected(&self) -> bool {
        MemoryOverlay::is_connected(self)
    }

    async fn put(&self, address: EntryAddress, entry: SignedEntry) -> Result<(), DhtError> {
        self.ensure_connected()?;

        if entry.is_protected() && entry.verify().is_err() {
            return Err(DhtError::Rejected("entry signature does not verify".into()));
        }

        let mut state = self.state.write();
        let versions = state.entry(address.tuple()).or_default();

        if let Some(owner) = tuple_owner(versions) {
            match entry.owner() {
                Some(incoming) if *incoming == owner => {}
                _ => {
                    debug!("put rejected at {}: tuple is protected", address);
                    return Err(DhtError::Rejected(
                        "tuple is protected by another key".into(),
                    ));
                }
            }
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        versions.insert(address.version, Stored { entry, seq });
        Ok(())
    }

    async fn get(&self, address: &EntryAddress) -> Result<Option<SignedEntry>, DhtError> {
        self.ensure_connected()?;
        Ok(self
            .state
            .read()
            .get(&address.tuple())
            .and_then(|versions| versions.get(&address.version))
            .map(|stored| stored.entry.clone()))
    }

    async fn get_latest(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
    ) -> Result<Option<(Key160, SignedEntry)>, DhtError> {
        self.ensure_connected()?;
        Ok(self
            .state
            .read()
            .get(&(location, domain, content))
            .and_then(|versions| {
                versions
                    .iter()
                    .max_by_key(|(_, stored)| stored.seq)
                    .map(|(version, stored)| (*version, stored.entry.clone()))
            }))
    }

    async fn remove(
        &self,
        address: &EntryAddress,
        proof: Option<RemovalProof>,
    ) -> Result<(), DhtError> {
        self.ensure_connected()?;
        let (location, domain, content) = address.tuple();

        let mut state = self.state.write();
        let Some(versions) = state.get_mut(&address.tuple()) else {
            return Ok(());
        };

        if let Some(owner) = tuple_owner(versions) {
            let Some(proof) = proof else {
                return Err(DhtError::Rejected(
                    "protected entry requires a removal proof".into(),
                ));
            };
            if *proof.owner() != owner {
                return Err(DhtError::Rejected(
                    "removal proof is not from the bound owner".into(),
                ));
            }
            proof
                .verify(location, domain, content, address.version, address.version)
                .map_err(|_| DhtError::Rejected("removal proof does not verify".into()))?;
        }

        versions.remove(&address.version);
        if versions.is_empty() {
            state.remove(&address.tuple());
        }
        Ok(())
    }

    async fn remove_range(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        from: Key160,
        to: Key160,
        proof: Option<RemovalProof>,
    ) -> Result<usize, DhtError> {
        self.ensure_connected()?;

        let mut state = self.state.write();
        let Some(versions) = state.get_mut(&(location, domain, content)) else {
            return Ok(0);
        };

        if let Some(owner) = tuple_owner(versions) {
            let Some(proof) = proof else {
                return Err(DhtError::Rejected(
                    "protected entry requires a removal proof".into(),
                ));
            };
            if *proof.owner() != owner {
                return Err(DhtError::Rejected(
                    "removal proof is not from the bound owner".into(),
                ));
            }
            proof
                .verify(location, domain, content, from, to)
                .map_err(|_| DhtError::Rejected("removal proof does not verify".into()))?;
        }

        let doomed: Vec<Key160> = versions.range(from..to).map(|(v, _)| *v).collect();
        for version in &doomed {
            versions.remove(version);
        }
        if versions.is_empty() {
            state.remove(&(location, domain, content));
        }
        Ok(doomed.len())
    }

    async fn digests(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
    ) -> Result<Vec<VersionDigest>, DhtError> {
        self.ensure_connected()?;
        Ok(self
            .state
            .read()
            .get(&(location, domain, content))
            .map(|versions| {
                versions
                    .iter()
                    .map(|(version, stored)| VersionDigest {
                        version: *version,
                        digest: stored.entry.digest(),
                        based_on: stored.entry.based_on(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn transfer(
        &self,
        location: Key160,
        domain: Key160,
        content: Key160,
        grant: TransferGrant,
    ) -> Result<(), DhtError> {
        self.ensure_connected()?;

        let mut state = self.state.write();
        let Some(versions) = state.get_mut(&(location, domain, content)) else {
            return Err(DhtError::NotFound);
        };
        let Some(owner) = tuple_owner(versions) else {
            return Err(DhtError::Rejected("tuple is not protected".into()));
        };

        grant
            .verify_authorization(location, domain, content, &owner)
            .map_err(|_| DhtError::Rejected("transfer not authorized by the bound owner".into()))?;

        // Validate every live version before touching anything: the
        // rebinding applies completely or not at all.
        let mut pending = Vec::with_capacity(versions.len());
        for (version, stored) in versions.iter() {
            let Some(signature) = grant.signature_for(*version) else {
                return Err(DhtError::Rejected(
                    "transfer does not cover every live version".into(),
                ));
            };
            if !stored
                .entry
                .signature_valid_under(grant.new_owner(), signature)
            {
                return Err(DhtError::Rejected(
                    "rebind signature does not verify".into(),
                ));
            }
            pending.push((*version, signature.to_owned()));
        }

        let new_owner = *grant.new_owner();
        for (version, signature) in pending {
            if let Some(stored) = versions.get_mut(&version) {
                stored.entry.rebind(new_owner, signature);
            }
        }
        debug!(
            "protection transferred for {}/{}/{} ({} versions)",
            location,
            domain,
            content,
            versions.len()
        );
        Ok(())
    }
}
