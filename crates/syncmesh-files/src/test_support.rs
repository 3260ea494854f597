//! Shared fixture for the file layer tests.

use crate::manager::FileManager;
use crate::profile::FileIndex;
use crate::session::{Session, SyncNode};
use crate::SyncConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncmesh_dht::{MemoryOverlay, ProtectedEntryClient};
use syncmesh_types::UserId;

/// A logged-in node over an in-memory overlay, rooted in a temp dir.
///
/// Uses a small chunk size so ordinary test payloads span multiple
/// chunks.
pub(crate) struct TestRig {
    dir: tempfile::TempDir,
    overlay: Arc<MemoryOverlay>,
    node: Arc<SyncNode>,
    manager: FileManager,
}

impl TestRig {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let overlay = Arc::new(MemoryOverlay::new());
        let client = Arc::new(ProtectedEntryClient::new(
            Arc::clone(&overlay) as Arc<dyn syncmesh_dht::Overlay>
        ));
        let node = Arc::new(SyncNode::new(Arc::clone(&client)));
        node.open_session(Session::new(
            dir.path().to_path_buf(),
            UserId::from_name("alice"),
            b"correct horse battery staple",
            client,
            SyncConfig::default().with_chunk_size(8),
        ));
        let manager = FileManager::new(Arc::clone(&node));
        Self {
            dir,
            overlay,
            node,
            manager,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn overlay(&self) -> &Arc<MemoryOverlay> {
        &self.overlay
    }

    pub(crate) fn node(&self) -> &Arc<SyncNode> {
        &self.node
    }

    pub(crate) fn manager(&self) -> &FileManager {
        &self.manager
    }

    pub(crate) fn session(&self) -> Arc<Session> {
        self.node.session().expect("session open")
    }

    /// Writes a file under the root, creating parent directories.
    pub(crate) fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("parents");
        }
        std::fs::write(&path, contents).expect("write");
        path
    }

    /// The profile index of a path that must exist.
    pub(crate) async fn index_of(&self, relative: &str) -> FileIndex {
        self.session()
            .profiles()
            .snapshot()
            .await
            .expect("profile")
            .get_by_path(Path::new(relative))
            .unwrap_or_else(|| panic!("'{relative}' not in profile"))
            .clone()
    }
}
