//! Signed overlay entries and protection keys.
//!
//! A protected entry binds a payload to a public key: the owner signs
//! `sha256(payload) || based_on`, so tampering with either the payload
//! or the version lineage reference invalidates verification. The
//! receiver enforces that only the bound owner can overwrite or remove
//! the value.
//!
//! Signing over the payload *digest* (rather than the raw bytes) is
//! what makes protection transfer a single logical operation: the new
//! owner can re-sign every stored version from its digests, without
//! ever downloading the payloads.

use crate::{DhtError, Key160};
use bytes::Bytes;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// An ed25519 keypair protecting overlay entries.
#[derive(Clone)]
pub struct ProtectionKeys {
    signing: SigningKey,
}

impl ProtectionKeys {
    /// Generates a fresh keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Derives a keypair deterministically from a 32-byte seed.
    ///
    /// The same seed yields the same keypair, which is how a session
    /// rebinds to its own entries across logins.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public half - what entries are bound to.
    #[must_use]
    pub fn public(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Signs an arbitrary message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl std::fmt::Debug for ProtectionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionKeys")
            .field("public", &hex::encode(self.public().as_bytes()))
            .finish()
    }
}

/// The message a protected entry's signature covers.
#[must_use]
pub(crate) fn signing_message(payload_digest: &[u8; 32], based_on: &Key160) -> Vec<u8> {
    let mut message = Vec::with_capacity(32 + crate::key::KEY_LENGTH);
    message.extend_from_slice(payload_digest);
    message.extend_from_slice(based_on.as_bytes());
    message
}

/// One value stored in the overlay.
///
/// | Field | Meaning |
/// |-------|---------|
/// | `payload` | Opaque value bytes |
/// | `ttl` | Requested lifetime (expiry is the overlay's concern) |
/// | `based_on` | Predecessor version; [`Key160::ZERO`] for a root |
/// | `protected` | Whether mutations require the owner's signature |
/// | `owner` / `signature` | The binding, for protected entries |
#[derive(Debug, Clone)]
pub struct SignedEntry {
    payload: Bytes,
    ttl: Option<Duration>,
    based_on: Key160,
    protected: bool,
    owner: Option<VerifyingKey>,
    signature: Option<Signature>,
}

impl SignedEntry {
    /// Creates a protected entry signed by `keys`.
    #[must_use]
    pub fn sign(
        payload: Bytes,
        based_on: Key160,
        ttl: Option<Duration>,
        keys: &ProtectionKeys,
    ) -> Self {
        let digest: [u8; 32] = Sha256::digest(&payload).into();
        let signature = keys.sign(&signing_message(&digest, &based_on));
        Self {
            payload,
            ttl,
            based_on,
            protected: true,
            owner: Some(keys.public()),
            signature: Some(signature),
        }
    }

    /// Creates an unprotected, unsigned entry.
    #[must_use]
    pub fn unsigned(payload: Bytes, based_on: Key160, ttl: Option<Duration>) -> Self {
        Self {
            payload,
            ttl,
            based_on,
            protected: false,
            owner: None,
            signature: None,
        }
    }

    /// The value bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The predecessor version reference.
    #[must_use]
    pub fn based_on(&self) -> Key160 {
        self.based_on
    }

    /// The requested lifetime.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Whether mutations require the owner's signature.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// The bound owner key, for protected entries.
    #[must_use]
    pub fn owner(&self) -> Option<&VerifyingKey> {
        self.owner.as_ref()
    }

    /// SHA-256 of the payload.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.payload).into()
    }

    /// Verifies the entry against its own declared owner.
    ///
    /// Unprotected entries verify trivially.
    ///
    /// # Errors
    ///
    /// [`DhtError::SignatureInvalid`] if the binding does not hold.
    pub fn verify(&self) -> Result<(), DhtError> {
        if !self.protected {
            return Ok(());
        }
        let (Some(owner), Some(signature)) = (&self.owner, &self.signature) else {
            return Err(DhtError::SignatureInvalid);
        };
        let message = signing_message(&self.digest(), &self.based_on);
        owner
            .verify(&message, signature)
            .map_err(|_| DhtError::SignatureInvalid)
    }

    /// Verifies the entry under an expected owner key.
    ///
    /// # Errors
    ///
    /// [`DhtError::SignatureInvalid`] if the entry is unprotected,
    /// bound to a different key, or the signature does not verify.
    pub fn verify_with(&self, expected: &VerifyingKey) -> Result<(), DhtError> {
        if self.owner.as_ref() != Some(expected) {
            return Err(DhtError::SignatureInvalid);
        }
        self.verify()
    }

    /// Checks a candidate signature for this entry's content under an
    /// arbitrary key, without touching the stored binding.
    #[must_use]
    pub fn signature_valid_under(&self, key: &VerifyingKey, signature: &Signature) -> bool {
        let message = signing_message(&self.digest(), &self.based_on);
        key.verify(&message, signature).is_ok()
    }

    /// Rebinds the entry to a new owner. Used by the overlay when it
    /// applies a verified protection transfer.
    pub(crate) fn rebind(&mut self, owner: VerifyingKey, signature: Signature) {
        self.protected = true;
        self.owner = Some(owner);
        self.signature = Some(signature);
    }
}
