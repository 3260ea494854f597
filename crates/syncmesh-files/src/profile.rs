//! User profile, file indices and meta documents.
//!
//! The profile is the user's view of their synchronized tree: one
//! [`FileIndex`] per known file or folder. File contents are described
//! by a per-file [`MetaDocument`] listing the chunk keys of every
//! version. Both documents are JSON payloads stored as protected,
//! version-chained overlay entries under the user's protection keys.
//!
//! # Concurrency
//!
//! [`ProfileManager`] serializes mutations at the profile level: reads
//! are snapshots, writes go through `update` which holds the manager's
//! write lock across fetch-modify-put.

use crate::{addressing, FileError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncmesh_dht::{Key160, ProtectedEntryClient, ProtectionKeys};
use syncmesh_types::{UserId, UserPermission};
use tracing::debug;

/// One known file or folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIndex {
    /// Stable key of this file, independent of its path.
    pub file_key: Key160,
    /// Path relative to the synchronized root.
    pub relative_path: PathBuf,
    /// Whether this is a folder.
    pub folder: bool,
    /// Location of the file's meta document; `None` for folders.
    pub meta_location: Option<Key160>,
    /// Sharing grant on this folder, if any.
    pub share: Option<UserPermission>,
}

impl FileIndex {
    /// Creates an index for a file.
    #[must_use]
    pub fn file(file_key: Key160, relative_path: PathBuf, meta_location: Key160) -> Self {
        Self {
            file_key,
            relative_path,
            folder: false,
            meta_location: Some(meta_location),
            share: None,
        }
    }

    /// Creates an index for a folder.
    #[must_use]
    pub fn directory(file_key: Key160, relative_path: PathBuf) -> Self {
        Self {
            file_key,
            relative_path,
            folder: true,
            meta_location: None,
            share: None,
        }
    }
}

/// One stored version of a file's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileVersion {
    /// Monotonic version index, starting at 0.
    pub index: u32,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Chunk locations, in order.
    pub chunk_keys: Vec<Key160>,
}

/// Per-file version catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDocument {
    /// The file this document describes.
    pub file_key: Key160,
    /// All stored versions, oldest first.
    pub versions: Vec<FileVersion>,
}

impl MetaDocument {
    /// Creates a document with one initial version.
    #[must_use]
    pub fn new(file_key: Key160, initial: FileVersion) -> Self {
        Self {
            file_key,
            versions: vec![initial],
        }
    }

    /// The most recent version.
    #[must_use]
    pub fn newest(&self) -> Option<&FileVersion> {
        self.versions.last()
    }

    /// The index the next version will get.
    #[must_use]
    pub fn next_index(&self) -> u32 {
        self.newest().map_or(0, |v| v.index + 1)
    }
}

/// The user's view of their synchronized tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    indices: Vec<FileIndex>,
}

impl UserProfile {
    /// Looks an index up by its stable file key.
    #[must_use]
    pub fn get_by_key(&self, file_key: Key160) -> Option<&FileIndex> {
        self.indices.iter().find(|i| i.file_key == file_key)
    }

    /// Looks an index up by relative path.
    #[must_use]
    pub fn get_by_path(&self, relative_path: &Path) -> Option<&FileIndex> {
        self.indices.iter().find(|i| i.relative_path == relative_path)
    }

    /// Mutable lookup by file key.
    pub fn get_mut_by_key(&mut self, file_key: Key160) -> Option<&mut FileIndex> {
        self.indices.iter_mut().find(|i| i.file_key == file_key)
    }

    /// Inserts an index, replacing any entry with the same file key.
    pub fn insert(&mut self, index: FileIndex) {
        self.remove(index.file_key);
        self.indices.push(index);
    }

    /// Removes and returns the index with the given file key.
    pub fn remove(&mut self, file_key: Key160) -> Option<FileIndex> {
        let position = self.indices.iter().position(|i| i.file_key == file_key)?;
        Some(self.indices.remove(position))
    }

    /// Indices whose path is strictly under `folder`.
    #[must_use]
    pub fn descendants_of(&self, folder: &Path) -> Vec<&FileIndex> {
        self.indices
            .iter()
            .filter(|i| i.relative_path != folder && i.relative_path.starts_with(folder))
            .collect()
    }

    /// All known relative paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> =
            self.indices.iter().map(|i| i.relative_path.clone()).collect();
        paths.sort();
        paths
    }

    /// Number of known indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if nothing is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// DHT-backed profile access with profile-level write serialization.
pub struct ProfileManager {
    client: Arc<ProtectedEntryClient>,
    keys: ProtectionKeys,
    user: UserId,
    location: Key160,
    write_lock: tokio::sync::Mutex<()>,
}

impl ProfileManager {
    /// Creates a manager for one user's profile.
    #[must_use]
    pub fn new(client: Arc<ProtectedEntryClient>, user: UserId, keys: ProtectionKeys) -> Self {
        let location = addressing::profile_location(&user);
        Self {
            client,
            keys,
            user,
            location,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The user this profile belongs to.
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// The protection keys profile entries are bound to.
    #[must_use]
    pub fn keys(&self) -> &ProtectionKeys {
        &self.keys
    }

    /// Fetches a verified snapshot of the profile.
    ///
    /// An absent profile reads as empty. Steps must treat the returned
    /// value as a snapshot - it does not track later writes.
    pub async fn snapshot(&self) -> Result<UserProfile, FileError> {
        Ok(self.fetch().await?.1)
    }

    /// Applies a mutation to the profile and stores the next version.
    ///
    /// Holds the profile write lock across fetch-modify-put, so
    /// concurrent updates serialize. Returns the stored profile.
    pub async fn update<F>(&self, mutate: F) -> Result<UserProfile, FileError>
    where
        F: FnOnce(&mut UserProfile) -> Result<(), FileError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let (previous, mut profile) = self.fetch().await?;
        mutate(&mut profile)?;

        let payload = serde_json::to_vec(&profile)?;
        let version = addressing::next_version(previous, &payload);
        debug!(
            "storing profile of {} ({} indices, version {})",
            self.user,
            profile.len(),
            version
        );
        self.client
            .put(
                self.location,
                addressing::domain_key(),
                addressing::profile_content(),
                version,
                previous,
                Bytes::from(payload),
                &self.keys,
            )
            .await?;
        Ok(profile)
    }

    async fn fetch(&self) -> Result<(Key160, UserProfile), FileError> {
        match self
            .client
            .get_latest(
                self.location,
                addressing::domain_key(),
                addressing::profile_content(),
            )
            .await?
        {
            Some((version, entry)) => {
                entry.verify_with(&self.keys.public())?;
                let profile = serde_json::from_slice(entry.payload())?;
                Ok((version, profile))
            }
            None => Ok((Key160::ZERO, UserProfile::default())),
        }
    }
}

impl std::fmt::Debug for ProfileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileManager")
            .field("user", &self.user)
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncmesh_dht::MemoryOverlay;

    fn index(path: &str, folder: bool) -> FileIndex {
        let key = Key160::hash(path);
        if folder {
            FileIndex::directory(key, PathBuf::from(path))
        } else {
            FileIndex::file(key, PathBuf::from(path), Key160::hash(format!("meta:{path}")))
        }
    }

    #[test]
    fn profile_insert_lookup_remove() {
        let mut profile = UserProfile::default();
        profile.insert(index("a", true));
        profile.insert(index("a/b.txt", false));

        assert_eq!(profile.len(), 2);
        assert!(profile.get_by_path(Path::new("a")).is_some());
        assert!(profile.get_by_key(Key160::hash("a/b.txt")).is_some());

        let removed = profile.remove(Key160::hash("a")).expect("removed");
        assert!(removed.folder);
        assert!(profile.get_by_path(Path::new("a")).is_none());
    }

    #[test]
    fn insert_replaces_same_key() {
        let mut profile = UserProfile::default();
        profile.insert(index("a.txt", false));

        let mut moved = index("a.txt", false);
        moved.relative_path = PathBuf::from("b.txt");
        moved.file_key = Key160::hash("a.txt");
        profile.insert(moved);

        assert_eq!(profile.len(), 1);
        assert!(profile.get_by_path(Path::new("b.txt")).is_some());
    }

    #[test]
    fn descendants_excludes_the_folder_itself() {
        let mut profile = UserProfile::default();
        profile.insert(index("a", true));
        profile.insert(index("a/b", true));
        profile.insert(index("a/b/c.txt", false));
        profile.insert(index("other.txt", false));

        let descendants = profile.descendants_of(Path::new("a"));
        let mut paths: Vec<_> = descendants.iter().map(|i| i.relative_path.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("a/b"), PathBuf::from("a/b/c.txt")]);
    }

    #[test]
    fn meta_document_versioning() {
        let v0 = FileVersion {
            index: 0,
            size: 10,
            chunk_keys: vec![Key160::hash("c0")],
        };
        let mut doc = MetaDocument::new(Key160::hash("f"), v0);
        assert_eq!(doc.next_index(), 1);

        doc.versions.push(FileVersion {
            index: 1,
            size: 20,
            chunk_keys: vec![Key160::hash("c1")],
        });
        assert_eq!(doc.newest().map(|v| v.index), Some(1));
        assert_eq!(doc.next_index(), 2);
    }

    #[test]
    fn profile_serde_roundtrip() {
        let mut profile = UserProfile::default();
        profile.insert(index("a", true));
        profile.insert(index("a/b.txt", false));

        let json = serde_json::to_vec(&profile).expect("serialize");
        let restored: UserProfile = serde_json::from_slice(&json).expect("deserialize");
        assert_eq!(restored.paths(), profile.paths());
    }

    #[tokio::test]
    async fn manager_snapshot_of_absent_profile_is_empty() {
        let overlay = Arc::new(MemoryOverlay::new());
        let client = Arc::new(ProtectedEntryClient::new(overlay));
        let manager = ProfileManager::new(
            client,
            UserId::from_name("alice"),
            ProtectionKeys::generate(),
        );

        let profile = manager.snapshot().await.expect("snapshot");
        assert!(profile.is_empty());
    }

    #[tokio::test]
    async fn manager_update_persists_and_chains_versions() {
        let overlay = Arc::new(MemoryOverlay::new());
        let client = Arc::new(ProtectedEntryClient::new(overlay));
        let manager = ProfileManager::new(
            client,
            UserId::from_name("alice"),
            ProtectionKeys::generate(),
        );

        manager
            .update(|profile| {
                profile.insert(index("a.txt", false));
                Ok(())
            })
            .await
            .expect("first update");
        manager
            .update(|profile| {
                profile.insert(index("b.txt", false));
                Ok(())
            })
            .await
            .expect("second update");

        let profile = manager.snapshot().await.expect("snapshot");
        assert_eq!(profile.paths(), vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[tokio::test]
    async fn mutation_error_stores_nothing() {
        let overlay = Arc::new(MemoryOverlay::new());
        let client = Arc::new(ProtectedEntryClient::new(Arc::clone(&overlay) as _));
        let manager = ProfileManager::new(
            client,
            UserId::from_name("alice"),
            ProtectionKeys::generate(),
        );

        let err = manager
            .update(|_| Err(FileError::IllegalArgument("nope".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::IllegalArgument(_)));
        assert!(overlay.is_empty());
    }
}
