//! Protected DHT entries for syncmesh.
//!
//! The synchronization core keeps all shared state - user profiles,
//! file metadata, chunks - in a replicated key-value overlay. This
//! crate provides the integrity contract those values live under: each
//! entry is bound to a public key, carries version lineage, and can
//! only be mutated by puts signed under the bound key.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Core Layer                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  syncmesh-process : steps, composites, async wrapper         │
//! │  syncmesh-dht     : protected entry client, overlay ◄── HERE │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Pieces
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Key160`] / [`EntryAddress`] | 160-bit keys and the `(location, domain, content, version)` tuple |
//! | [`ProtectionKeys`] | The ed25519 keypair entries are bound to |
//! | [`SignedEntry`] | Payload + TTL + lineage + owner binding |
//! | [`Overlay`] | The primitive put/get/remove surface (external) |
//! | [`ProtectedEntryClient`] | Sign-on-put, verify-on-get, proofs, transfer |
//! | [`MemoryOverlay`] | In-process overlay with full protection semantics |
//!
//! # Protection Contract
//!
//! 1. The signature covers the payload digest and the `based_on`
//!    lineage reference; tampering with either invalidates it.
//! 2. `based_on = ZERO` means "root version".
//! 3. A put whose signature does not verify - or that presents a key
//!    other than the bound owner - is rejected at the receiver with no
//!    state change.
//! 4. A protection transfer is one logical operation: every version at
//!    the tuple rebinds to the new owner, or none does.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use std::sync::Arc;
//! use syncmesh_dht::{Key160, MemoryOverlay, ProtectedEntryClient, ProtectionKeys};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), syncmesh_dht::DhtError> {
//! let overlay = Arc::new(MemoryOverlay::new());
//! let client = ProtectedEntryClient::new(overlay);
//! let keys = ProtectionKeys::generate();
//!
//! let (loc, dom, cont) = (
//!     Key160::hash("alice"),
//!     Key160::hash("files"),
//!     Key160::hash("profile"),
//! );
//! client
//!     .put(loc, dom, cont, Key160::ZERO, Key160::ZERO, Bytes::from_static(b"v1"), &keys)
//!     .await?;
//!
//! let entry = client.get(loc, dom, cont, Key160::ZERO).await?.expect("stored");
//! entry.verify_with(&keys.public())?;
//! # Ok(())
//! # }
//! ```

mod client;
mod entry;
mod error;
mod key;
mod memory;
mod overlay;

pub use client::{ClientConfig, ProtectedEntryClient};
pub use entry::{ProtectionKeys, SignedEntry};
pub use error::DhtError;
pub use key::{EntryAddress, Key160, KEY_LENGTH};
pub use memory::MemoryOverlay;
pub use overlay::{Overlay, RemovalProof, TransferGrant, VersionDigest};
