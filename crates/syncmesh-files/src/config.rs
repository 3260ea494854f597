//! Synchronization configuration.

use serde::{Deserialize, Serialize};

/// Default chunk size: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Tunables of the file synchronization layer.
///
/// # Example
///
/// ```
/// use syncmesh_files::SyncConfig;
///
/// let config = SyncConfig::default().with_chunk_size(16 * 1024);
/// assert_eq!(config.chunk_size, 16 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Size of one plaintext chunk before encryption.
    pub chunk_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SyncConfig {
    /// Sets the chunk size. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}
