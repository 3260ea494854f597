//! User session and node handle.
//!
//! A [`Session`] binds a logged-in user to their synchronized root
//! directory, profile manager, entry client and chunk cipher. The
//! protection keys and the cipher key are both derived
//! deterministically from the user's credentials, so a user rebinds to
//! their own overlay entries on every login.
//!
//! [`SyncNode`] is what the façade holds: the overlay connection plus
//! the currently open session, if any.

use crate::chunk::{ChaChaChunkCipher, ChunkCipher};
use crate::profile::ProfileManager;
use crate::{FileError, SyncConfig};
use hkdf::Hkdf;
use parking_lot::RwLock;
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncmesh_dht::{ProtectedEntryClient, ProtectionKeys};
use syncmesh_types::UserId;
use tracing::info;

/// A logged-in user bound to a synchronized root.
pub struct Session {
    root: PathBuf,
    user: UserId,
    profiles: Arc<ProfileManager>,
    client: Arc<ProtectedEntryClient>,
    cipher: Arc<dyn ChunkCipher>,
    config: SyncConfig,
}

impl Session {
    /// Opens a session.
    ///
    /// `credentials` seed both the protection keys and the chunk
    /// cipher, via independent HKDF expansions.
    #[must_use]
    pub fn new(
        root: PathBuf,
        user: UserId,
        credentials: &[u8],
        client: Arc<ProtectedEntryClient>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let hkdf = Hkdf::<Sha256>::new(Some(user.name().as_bytes()), credentials);
        let mut seed = [0u8; 32];
        // 32 bytes is always a valid HKDF output length.
        let _ = hkdf.expand(b"syncmesh-protection-keys", &mut seed);
        let keys = ProtectionKeys::from_seed(seed);

        let mut cipher_secret = [0u8; 32];
        let _ = hkdf.expand(b"syncmesh-chunk-secret", &mut cipher_secret);

        info!("session opened for {} at {}", user, root.display());
        Arc::new(Self {
            profiles: Arc::new(ProfileManager::new(Arc::clone(&client), user.clone(), keys)),
            cipher: Arc::new(ChaChaChunkCipher::from_secret(&cipher_secret)),
            root,
            user,
            client,
            config,
        })
    }

    /// The synchronized root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The logged-in user.
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// The profile manager.
    #[must_use]
    pub fn profiles(&self) -> &Arc<ProfileManager> {
        &self.profiles
    }

    /// The protected-entry client.
    #[must_use]
    pub fn client(&self) -> &Arc<ProtectedEntryClient> {
        &self.client
    }

    /// The chunk cipher.
    #[must_use]
    pub fn cipher(&self) -> &Arc<dyn ChunkCipher> {
        &self.cipher
    }

    /// Synchronization tunables.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns `true` if `path` is the root itself.
    #[must_use]
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }

    /// Returns `true` if `path` lies strictly inside the root.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        !self.is_root(path) && path.starts_with(&self.root)
    }

    /// The path of `absolute` relative to the root.
    ///
    /// # Errors
    ///
    /// [`FileError::IllegalLocation`] if the path is outside the root
    /// or the root itself.
    pub fn relativize(&self, absolute: &Path) -> Result<PathBuf, FileError> {
        if self.is_root(absolute) {
            return Err(FileError::IllegalLocation(
                "the root itself cannot be addressed".into(),
            ));
        }
        absolute
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| {
                FileError::IllegalLocation(format!(
                    "'{}' is outside the synchronized root",
                    absolute.display()
                ))
            })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("root", &self.root)
            .finish()
    }
}

/// The node handle the façade operates on: overlay connection plus the
/// current session.
pub struct SyncNode {
    client: Arc<ProtectedEntryClient>,
    session: RwLock<Option<Arc<Session>>>,
}

impl SyncNode {
    /// Creates a node with no open session.
    #[must_use]
    pub fn new(client: Arc<ProtectedEntryClient>) -> Self {
        Self {
            client,
            session: RwLock::new(None),
        }
    }

    /// The protected-entry client.
    #[must_use]
    pub fn client(&self) -> &Arc<ProtectedEntryClient> {
        &self.client
    }

    /// Installs the open session.
    pub fn open_session(&self, session: Arc<Session>) {
        *self.session.write() = Some(session);
    }

    /// Drops the open session.
    pub fn close_session(&self) {
        if self.session.write().take().is_some() {
            info!("session closed");
        }
    }

    /// The open session.
    ///
    /// # Errors
    ///
    /// [`FileError::NoSession`] if no session is open.
    pub fn session(&self) -> Result<Arc<Session>, FileError> {
        self.session.read().clone().ok_or(FileError::NoSession)
    }

    /// Checks the overlay connection.
    ///
    /// # Errors
    ///
    /// [`FileError::NoPeerConnection`] if the overlay is unreachable.
    pub fn ensure_connected(&self) -> Result<(), FileError> {
        if self.client.overlay().is_connected() {
            Ok(())
        } else {
            Err(FileError::NoPeerConnection)
        }
    }
}

impl std::fmt::Debug for SyncNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncNode")
            .field("has_session", &self.session.read().is_some())
            .finish()
    }
}
