//! Chunking and the chunk cipher seam.
//!
//! File contents are split into fixed-size chunks before they go into
//! the overlay, and every chunk is encrypted. The cipher itself is a
//! collaborator behind the [`ChunkCipher`] trait - the pipelines only
//! rely on the contract; [`ChaChaChunkCipher`] is the shipped
//! implementation (ChaCha20-Poly1305 with an index-derived nonce, key
//! material expanded with HKDF-SHA256).
//!
//! The nonce is derived from the chunk's position - version index in
//! the high half, chunk index in the low half - so no two chunks of
//! one file ever reuse a nonce under the same key.

use crate::FileError;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

/// Cipher key width in bytes.
pub const KEY_SIZE: usize = 32;

/// Nonce width of ChaCha20-Poly1305 in bytes.
const NONCE_SIZE: usize = 12;

/// Encrypts and decrypts chunks by their position.
///
/// Implementations must be deterministic per `(key, chunk_index)` and
/// authenticated: decryption of tampered data must fail.
pub trait ChunkCipher: Send + Sync {
    /// Seals one chunk.
    fn encrypt(&self, chunk_index: u64, plaintext: &[u8]) -> Result<Vec<u8>, FileError>;

    /// Opens one chunk, verifying its authentication tag.
    fn decrypt(&self, chunk_index: u64, ciphertext: &[u8]) -> Result<Vec<u8>, FileError>;
}

/// ChaCha20-Poly1305 chunk cipher.
pub struct ChaChaChunkCipher {
    key: Key,
}

impl ChaChaChunkCipher {
    /// Derives the cipher key from a user secret via HKDF-SHA256.
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, secret);
        let mut key = [0u8; KEY_SIZE];
        // 32 bytes is always a valid HKDF output length.
        let _ = hkdf.expand(b"syncmesh-chunk-cipher", &mut key);
        Self {
            key: Key::from(key),
        }
    }

    fn nonce(chunk_index: u64) -> Nonce {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[..8].copy_from_slice(&chunk_index.to_le_bytes());
        Nonce::from(bytes)
    }
}

impl ChunkCipher for ChaChaChunkCipher {
    fn encrypt(&self, chunk_index: u64, plaintext: &[u8]) -> Result<Vec<u8>, FileError> {
        ChaCha20Poly1305::new(&self.key)
            .encrypt(&Self::nonce(chunk_index), plaintext)
            .map_err(|_| FileError::Cipher("chunk encryption failed".into()))
    }

    fn decrypt(&self, chunk_index: u64, ciphertext: &[u8]) -> Result<Vec<u8>, FileError> {
        ChaCha20Poly1305::new(&self.key)
            .decrypt(&Self::nonce(chunk_index), ciphertext)
            .map_err(|_| FileError::Cipher("chunk authentication failed".into()))
    }
}

/// The nonce index of one chunk: version index in the high 32 bits,
/// chunk index in the low 32 bits.
#[must_use]
pub fn nonce_index(version_index: u32, chunk_index: u32) -> u64 {
    (u64::from(version_index) << 32) | u64::from(chunk_index)
}
