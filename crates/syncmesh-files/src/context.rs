//! Typed pipeline contexts.
//!
//! Each user operation threads one context through its steps: fixed
//! inputs as plain fields, step outputs as write-once
//! [`ContextSlot`]s. A slot is filled by exactly one step during the
//! forward pass and may be cleared again by that step's rollback.

use crate::profile::{FileIndex, FileVersion, MetaDocument};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use syncmesh_dht::{Key160, ProtectionKeys};
use syncmesh_process::ContextSlot;
use syncmesh_types::UserPermission;

/// A fresh random overlay key (file keys, meta locations).
#[must_use]
pub(crate) fn fresh_key() -> Key160 {
    Key160::hash(rand::random::<[u8; 32]>())
}

/// Context of one "new file" pipeline (one path of an add).
pub struct AddFileContext {
    /// Absolute path of the file being added.
    pub absolute_path: PathBuf,
    /// Path relative to the synchronized root.
    pub relative_path: PathBuf,
    /// Whether the path is a folder.
    pub folder: bool,
    /// Stable key assigned to this file.
    pub file_key: Key160,
    /// Meta document location assigned to this file.
    pub meta_location: Key160,
    /// Written by the chunk upload step.
    pub chunks: ContextSlot<FileVersion>,
    /// Written by the meta document step.
    pub meta_version: ContextSlot<Key160>,
    /// Written by the profile step.
    pub index: ContextSlot<FileIndex>,
}

impl AddFileContext {
    /// Creates the context with fresh file and meta keys.
    #[must_use]
    pub fn new(absolute_path: PathBuf, relative_path: PathBuf, folder: bool) -> Arc<Self> {
        Arc::new(Self {
            absolute_path,
            relative_path,
            folder,
            file_key: fresh_key(),
            meta_location: fresh_key(),
            chunks: ContextSlot::new("chunks"),
            meta_version: ContextSlot::new("meta_version"),
            index: ContextSlot::new("index"),
        })
    }
}

/// Context of an update pipeline.
pub struct UpdateFileContext {
    /// Absolute path of the file being updated.
    pub absolute_path: PathBuf,
    /// Path relative to the synchronized root.
    pub relative_path: PathBuf,
    /// Written by the profile lookup step.
    pub index: ContextSlot<FileIndex>,
    /// Current meta document and its stored version key.
    pub meta: ContextSlot<(Key160, MetaDocument)>,
    /// Written by the chunk upload step.
    pub chunks: ContextSlot<FileVersion>,
    /// Version key of the updated meta document.
    pub new_meta_version: ContextSlot<Key160>,
}

impl UpdateFileContext {
    /// Creates the context.
    #[must_use]
    pub fn new(absolute_path: PathBuf, relative_path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            absolute_path,
            relative_path,
            index: ContextSlot::new("index"),
            meta: ContextSlot::new("meta"),
            chunks: ContextSlot::new("chunks"),
            new_meta_version: ContextSlot::new("new_meta_version"),
        })
    }
}

/// Context of a move pipeline.
pub struct MoveFileContext {
    /// Source path relative to the root.
    pub source: PathBuf,
    /// Destination path relative to the root.
    pub destination: PathBuf,
    /// `(file_key, previous_path)` of every re-pathed index, for
    /// rollback.
    pub moved: ContextSlot<Vec<(Key160, PathBuf)>>,
}

impl MoveFileContext {
    /// Creates the context.
    #[must_use]
    pub fn new(source: PathBuf, destination: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            source,
            destination,
            moved: ContextSlot::new("moved"),
        })
    }
}

/// A removed meta document together with the overlay coordinates a
/// rollback needs to put it back unchanged: the version key it was
/// stored under and its lineage reference.
#[derive(Debug, Clone)]
pub struct RemovedMetaDocument {
    /// The version key the document was stored under.
    pub version: Key160,
    /// The version the stored entry was based on.
    pub based_on: Key160,
    /// The document itself.
    pub document: MetaDocument,
}

/// Context of one "delete file" pipeline (one path of a delete).
pub struct DeleteFileContext {
    /// Path relative to the synchronized root.
    pub relative_path: PathBuf,
    /// The removed index, kept for rollback.
    pub removed_index: ContextSlot<FileIndex>,
    /// The removed meta document, kept for rollback.
    pub removed_meta: ContextSlot<RemovedMetaDocument>,
    /// The removed chunk entries `(location, sealed payload)`.
    pub removed_chunks: ContextSlot<Vec<(Key160, Bytes)>>,
}

impl DeleteFileContext {
    /// Creates the context.
    #[must_use]
    pub fn new(relative_path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            relative_path,
            removed_index: ContextSlot::new("removed_index"),
            removed_meta: ContextSlot::new("removed_meta"),
            removed_chunks: ContextSlot::new("removed_chunks"),
        })
    }
}

/// Context of a download pipeline.
pub struct DownloadFileContext {
    /// Key of the file to download.
    pub file_key: Key160,
    /// Destination override; defaults to the file's place under the
    /// root.
    pub destination: Option<PathBuf>,
    /// Written by the profile lookup step.
    pub index: ContextSlot<FileIndex>,
    /// Written by the meta document step.
    pub meta: ContextSlot<MetaDocument>,
    /// The path that was created or written.
    pub downloaded: ContextSlot<PathBuf>,
}

impl DownloadFileContext {
    /// Creates the context.
    #[must_use]
    pub fn new(file_key: Key160, destination: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            file_key,
            destination,
            index: ContextSlot::new("index"),
            meta: ContextSlot::new("meta"),
            downloaded: ContextSlot::new("downloaded"),
        })
    }
}

/// Context of a recover pipeline.
pub struct RecoverFileContext {
    /// Path relative to the synchronized root.
    pub relative_path: PathBuf,
    /// The recovered copy's path, once written.
    pub recovered: ContextSlot<PathBuf>,
}

impl RecoverFileContext {
    /// Creates the context.
    #[must_use]
    pub fn new(relative_path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            relative_path,
            recovered: ContextSlot::new("recovered"),
        })
    }
}

/// Context of a share pipeline.
pub struct ShareFolderContext {
    /// Folder path relative to the root.
    pub relative_path: PathBuf,
    /// The grant to record.
    pub permission: UserPermission,
    /// Keys the shared entries were rebound to.
    pub share_keys: ContextSlot<ProtectionKeys>,
    /// `(location, content)` tuples whose protection was transferred,
    /// for rollback.
    pub transferred: ContextSlot<Vec<(Key160, Key160)>>,
}

impl ShareFolderContext {
    /// Creates the context.
    #[must_use]
    pub fn new(relative_path: PathBuf, permission: UserPermission) -> Arc<Self> {
        Arc::new(Self {
            relative_path,
            permission,
            share_keys: ContextSlot::new("share_keys"),
            transferred: ContextSlot::new("transferred"),
        })
    }
}

/// Context of the file-list pipeline: just the result slot the async
/// wrapper exposes.
pub struct FileListContext {
    /// All known relative paths, sorted.
    pub result: Arc<ContextSlot<Vec<PathBuf>>>,
}

impl FileListContext {
    /// Creates the context.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            result: Arc::new(ContextSlot::new("file_list")),
        })
    }
}
