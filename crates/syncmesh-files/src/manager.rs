//! The file manager façade.
//!
//! One method per user operation. Each validates its arguments
//! synchronously - precondition errors never enter the process
//! framework - then asks the factory for the pipeline, wraps it for
//! background execution, starts it and returns the live handle.
//!
//! The handle is the full process surface: listeners, state, id,
//! progress, pause, resume, cancel. The result-bearing variant adds
//! `await_result`.

use crate::factory::ProcessFactory;
use crate::session::SyncNode;
use crate::steps::VersionSelector;
use crate::FileError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncmesh_dht::Key160;
use syncmesh_process::{AsyncComponent, AsyncResultComponent};
use syncmesh_types::{PermissionType, UserPermission};

/// Façade over the file synchronization pipelines.
pub struct FileManager {
    node: Arc<SyncNode>,
}

impl FileManager {
    /// Creates a manager on a node.
    #[must_use]
    pub fn new(node: Arc<SyncNode>) -> Self {
        Self { node }
    }

    fn factory(&self) -> Result<ProcessFactory, FileError> {
        let session = self.node.session()?;
        self.node.ensure_connected()?;
        Ok(ProcessFactory::new(session))
    }

    fn submit(&self, process: syncmesh_process::ProcessComponent) -> Result<AsyncComponent, FileError> {
        let handle = AsyncComponent::new(process);
        handle.start()?;
        Ok(handle)
    }

    /// Adds a file or directory tree to the network.
    ///
    /// # Errors
    ///
    /// - [`FileError::IllegalArgument`] for a nonexistent path or the
    ///   root itself.
    /// - [`FileError::IllegalLocation`] for a path outside the root.
    /// - [`FileError::NoSession`] / [`FileError::NoPeerConnection`].
    pub fn add(&self, path: &Path) -> Result<AsyncComponent, FileError> {
        let session = self.node.session()?;
        self.node.ensure_connected()?;

        if !path.exists() {
            return Err(FileError::IllegalArgument(format!(
                "'{}' does not exist",
                path.display()
            )));
        }
        if session.is_root(path) {
            return Err(FileError::IllegalArgument("the root cannot be added".into()));
        }
        if !session.contains(path) {
            return Err(FileError::IllegalLocation(format!(
                "'{}' is outside the synchronized root",
                path.display()
            )));
        }

        let process = ProcessFactory::new(session).add_process(path)?;
        self.submit(process)
    }

    /// Stores the file's current content as a new version.
    ///
    /// # Errors
    ///
    /// [`FileError::IllegalArgument`] for folders (a folder has one
    /// version only) and nonexistent paths.
    pub fn update(&self, path: &Path) -> Result<AsyncComponent, FileError> {
        let factory = self.factory()?;

        if !path.exists() {
            return Err(FileError::IllegalArgument(format!(
                "'{}' does not exist",
                path.display()
            )));
        }
        if path.is_dir() {
            return Err(FileError::IllegalArgument(
                "a folder has one version only".into(),
            ));
        }

        let process = factory.update_process(path)?;
        self.submit(process)
    }

    /// Moves a file or folder to a new path under the root.
    pub fn move_file(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<AsyncComponent, FileError> {
        let factory = self.factory()?;
        let process = factory.move_process(source, destination)?;
        self.submit(process)
    }

    /// Deletes a file or directory tree from the network.
    pub fn delete(&self, path: &Path) -> Result<AsyncComponent, FileError> {
        let factory = self.factory()?;

        if !path.exists() {
            return Err(FileError::IllegalArgument(format!(
                "'{}' does not exist",
                path.display()
            )));
        }

        let process = factory.delete_process(path)?;
        self.submit(process)
    }

    /// Downloads a file (or recreates a folder) by its key.
    pub fn download(
        &self,
        file_key: Key160,
        destination: Option<PathBuf>,
    ) -> Result<AsyncComponent, FileError> {
        let factory = self.factory()?;
        let process = factory.download_process(file_key, destination)?;
        self.submit(process)
    }

    /// Recovers an older version of a file, chosen through the
    /// selector.
    ///
    /// # Errors
    ///
    /// - [`FileError::IllegalArgument`] for folders.
    /// - [`FileError::NotFound`] for nonexistent files.
    pub fn recover(
        &self,
        path: &Path,
        selector: Arc<dyn VersionSelector>,
    ) -> Result<AsyncComponent, FileError> {
        let factory = self.factory()?;

        if path.is_dir() {
            return Err(FileError::IllegalArgument(
                "a folder has one version only".into(),
            ));
        }
        if !path.exists() {
            return Err(FileError::NotFound(format!(
                "'{}' does not exist",
                path.display()
            )));
        }

        let process = factory.recover_process(path, selector)?;
        self.submit(process)
    }

    /// Shares a folder with another user.
    ///
    /// # Errors
    ///
    /// - [`FileError::IllegalArgument`] for non-folders.
    /// - [`FileError::IllegalLocation`] for a nonexistent folder, a
    ///   folder outside the root, or the root itself.
    pub fn share(
        &self,
        folder: &Path,
        user_name: &str,
        permission: PermissionType,
    ) -> Result<AsyncComponent, FileError> {
        let session = self.node.session()?;
        self.node.ensure_connected()?;

        if !folder.exists() {
            return Err(FileError::IllegalLocation(format!(
                "'{}' does not exist",
                folder.display()
            )));
        }
        if !folder.is_dir() {
            return Err(FileError::IllegalArgument("only folders can be shared".into()));
        }
        if session.is_root(folder) {
            return Err(FileError::IllegalLocation(
                "the root itself cannot be shared".into(),
            ));
        }
        if !session.contains(folder) {
            return Err(FileError::IllegalLocation(format!(
                "'{}' is outside the synchronized root",
                folder.display()
            )));
        }

        let process = ProcessFactory::new(session)
            .share_process(folder, UserPermission::new(user_name, permission))?;
        self.submit(process)
    }

    /// Lists every path known to the profile.
    pub fn file_list(&self) -> Result<AsyncResultComponent<Vec<PathBuf>>, FileError> {
        let factory = self.factory()?;
        let (process, result) = factory.file_list_process();
        let handle = AsyncResultComponent::new(process, result);
        handle.start()?;
        Ok(handle)
    }
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager").field("node", &self.node).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRig;
    use syncmesh_process::ProcessState;

    #[tokio::test]
    async fn add_then_list_roundtrip() {
        let rig = TestRig::new();
        rig.write_file("docs/notes.txt", b"hello overlay");

        let handle = rig.manager().add(&rig.root().join("docs")).expect("submitted");
        assert_eq!(handle.join().await, ProcessState::Succeeded);

        let list = rig.manager().file_list().expect("submitted");
        let paths = list.await_result().await.expect("result");
        assert_eq!(
            paths,
            vec![PathBuf::from("docs"), PathBuf::from("docs/notes.txt")]
        );
    }

    #[tokio::test]
    async fn add_download_roundtrip_restores_contents() {
        let rig = TestRig::new();
        let file = rig.write_file("data.bin", b"some bytes that span multiple chunks");

        let handle = rig.manager().add(&file).expect("submitted");
        assert_eq!(handle.join().await, ProcessState::Succeeded);

        let file_key = rig.index_of("data.bin").await.file_key;
        std::fs::remove_file(&file).expect("remove local copy");

        let download = rig.manager().download(file_key, None).expect("submitted");
        assert_eq!(download.join().await, ProcessState::Succeeded);
        assert_eq!(
            std::fs::read(&file).expect("restored"),
            b"some bytes that span multiple chunks"
        );
    }

    #[tokio::test]
    async fn delete_tree_empties_profile() {
        let rig = TestRig::new();
        rig.write_file("a/b/file.txt", b"content");

        let added = rig.manager().add(&rig.root().join("a")).expect("submitted");
        assert_eq!(added.join().await, ProcessState::Succeeded);
        assert!(!rig.overlay().is_empty());

        let deleted = rig.manager().delete(&rig.root().join("a")).expect("submitted");
        assert_eq!(deleted.join().await, ProcessState::Succeeded);

        let profile = rig.session().profiles().snapshot().await.expect("profile");
        assert!(profile.is_empty());
    }

    #[tokio::test]
    async fn update_appends_a_version_and_download_sees_it() {
        let rig = TestRig::new();
        let file = rig.write_file("doc.txt", b"first version");

        let added = rig.manager().add(&file).expect("submitted");
        assert_eq!(added.join().await, ProcessState::Succeeded);

        std::fs::write(&file, b"second version, noticeably longer").expect("modify");
        let updated = rig.manager().update(&file).expect("submitted");
        assert_eq!(updated.join().await, ProcessState::Succeeded);

        let file_key = rig.index_of("doc.txt").await.file_key;
        std::fs::remove_file(&file).expect("remove local copy");

        let download = rig.manager().download(file_key, None).expect("submitted");
        assert_eq!(download.join().await, ProcessState::Succeeded);
        assert_eq!(
            std::fs::read(&file).expect("restored"),
            b"second version, noticeably longer"
        );
    }

    #[tokio::test]
    async fn recover_brings_back_an_old_version() {
        let rig = TestRig::new();
        let file = rig.write_file("doc.txt", b"first version");

        let added = rig.manager().add(&file).expect("submitted");
        assert_eq!(added.join().await, ProcessState::Succeeded);

        std::fs::write(&file, b"second version").expect("modify");
        let updated = rig.manager().update(&file).expect("submitted");
        assert_eq!(updated.join().await, ProcessState::Succeeded);

        let selector_fn: fn(&[crate::profile::FileVersion]) -> Option<&crate::profile::FileVersion> =
            |versions| versions.first();
        let selector: Arc<dyn VersionSelector> = Arc::new(selector_fn);
        let recovered = rig.manager().recover(&file, selector).expect("submitted");
        assert_eq!(recovered.join().await, ProcessState::Succeeded);

        assert_eq!(
            std::fs::read(rig.root().join("doc-v0.txt")).expect("recovered copy"),
            b"first version"
        );
        assert_eq!(std::fs::read(&file).expect("original intact"), b"second version");
    }

    #[tokio::test]
    async fn move_repaths_folder_and_descendants() {
        let rig = TestRig::new();
        rig.write_file("old/deep/file.txt", b"content");

        let added = rig.manager().add(&rig.root().join("old")).expect("submitted");
        assert_eq!(added.join().await, ProcessState::Succeeded);

        let moved = rig
            .manager()
            .move_file(&rig.root().join("old"), &rig.root().join("new"))
            .expect("submitted");
        assert_eq!(moved.join().await, ProcessState::Succeeded);

        let profile = rig.session().profiles().snapshot().await.expect("profile");
        assert_eq!(
            profile.paths(),
            vec![
                PathBuf::from("new"),
                PathBuf::from("new/deep"),
                PathBuf::from("new/deep/file.txt")
            ]
        );
    }

    #[tokio::test]
    async fn share_rebinds_meta_to_share_keys_and_records_grant() {
        let rig = TestRig::new();
        rig.write_file("shared/report.txt", b"shared content");

        let added = rig.manager().add(&rig.root().join("shared")).expect("submitted");
        assert_eq!(added.join().await, ProcessState::Succeeded);

        let shared = rig
            .manager()
            .share(&rig.root().join("shared"), "bob", PermissionType::Write)
            .expect("submitted");
        assert_eq!(shared.join().await, ProcessState::Succeeded);

        // The grant is recorded on the folder index.
        let folder = rig.index_of("shared").await;
        let grant = folder.share.expect("grant recorded");
        assert_eq!(grant.user_name, "bob");
        assert!(grant.permission.can_write());

        // The file's meta entry no longer verifies under the account
        // keys: protection moved to the share keys.
        let file = rig.index_of("shared/report.txt").await;
        let meta_location = file.meta_location.expect("file has meta");
        let (_, entry) = rig
            .session()
            .client()
            .get_latest(
                meta_location,
                crate::addressing::domain_key(),
                crate::addressing::meta_content(),
            )
            .await
            .expect("get")
            .expect("entry");
        assert!(entry
            .verify_with(&rig.session().profiles().keys().public())
            .is_err());
    }

    #[tokio::test]
    async fn interrupted_delete_restores_meta_at_its_original_version() {
        use syncmesh_process::testing::RecordingStep;

        let rig = TestRig::new();
        let file = rig.write_file("doc.txt", b"first version");

        let added = rig.manager().add(&file).expect("submitted");
        assert_eq!(added.join().await, ProcessState::Succeeded);

        // A second version gives the meta document a non-trivial
        // lineage chain worth preserving.
        std::fs::write(&file, b"second version").expect("modify");
        let updated = rig.manager().update(&file).expect("submitted");
        assert_eq!(updated.join().await, ProcessState::Succeeded);

        let meta_location = rig
            .index_of("doc.txt")
            .await
            .meta_location
            .expect("file has meta");
        let (version_before, entry_before) = rig
            .session()
            .client()
            .get_latest(
                meta_location,
                crate::addressing::domain_key(),
                crate::addressing::meta_content(),
            )
            .await
            .expect("get")
            .expect("entry");
        let stored_before = rig.overlay().len();

        // A delete pipeline that fails after every removal step ran:
        // the whole thing must come back, including the meta
        // document's exact overlay coordinates.
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let factory = ProcessFactory::new(rig.session());
        let mut pipeline = factory.delete_file_process(&file).expect("built");
        pipeline
            .add_step("boom", RecordingStep::failing("boom", &log))
            .expect("appended");
        pipeline.start().await.unwrap_err();

        let (version_after, entry_after) = rig
            .session()
            .client()
            .get_latest(
                meta_location,
                crate::addressing::domain_key(),
                crate::addressing::meta_content(),
            )
            .await
            .expect("get")
            .expect("restored");
        assert_eq!(version_after, version_before);
        assert_eq!(entry_after.based_on(), entry_before.based_on());
        assert_eq!(entry_after.payload(), entry_before.payload());

        // Chunks are back and the newest meta revision sits at its old
        // coordinates. Net change: the remove and its compensation
        // appended two profile versions, and the superseded older meta
        // revision (a historical snapshot of the same catalogue) is
        // not resurrected.
        assert_eq!(rig.overlay().len(), stored_before + 2 - 1);

        let profile = rig.session().profiles().snapshot().await.expect("profile");
        assert!(profile.get_by_path(Path::new("doc.txt")).is_some());
    }

    #[tokio::test]
    async fn failed_add_rolls_back_chunks_and_meta() {
        let rig = TestRig::new();
        let file = rig.write_file("dup.txt", b"content");

        let first = rig.manager().add(&file).expect("submitted");
        assert_eq!(first.join().await, ProcessState::Succeeded);
        let stored_before = rig.overlay().len();

        // Adding the same path again fails at the profile step; the
        // second copy's chunks and meta document are compensated.
        let second = rig.manager().add(&file).expect("submitted");
        assert_eq!(second.join().await, ProcessState::Failed);
        let reason = second.failure().expect("reason");
        assert!(reason.hint().contains("already in the profile"));

        assert_eq!(rig.overlay().len(), stored_before);
    }

    #[tokio::test]
    async fn add_guards() {
        let rig = TestRig::new();

        let err = rig.manager().add(&rig.root().join("missing.txt")).unwrap_err();
        assert!(matches!(err, FileError::IllegalArgument(_)));

        let err = rig.manager().add(rig.root()).unwrap_err();
        assert!(matches!(err, FileError::IllegalArgument(_)));

        let outside = tempfile::NamedTempFile::new().expect("temp file");
        let err = rig.manager().add(outside.path()).unwrap_err();
        assert!(matches!(err, FileError::IllegalLocation(_)));
    }

    #[tokio::test]
    async fn update_and_recover_reject_folders() {
        let rig = TestRig::new();
        let dir = rig.root().join("folder");
        std::fs::create_dir(&dir).expect("dir");

        let err = rig.manager().update(&dir).unwrap_err();
        assert!(matches!(err, FileError::IllegalArgument(_)));

        let selector_fn: fn(&[crate::profile::FileVersion]) -> Option<&crate::profile::FileVersion> =
            |versions| versions.first();
        let selector: Arc<dyn VersionSelector> = Arc::new(selector_fn);
        let err = rig.manager().recover(&dir, selector).unwrap_err();
        assert!(matches!(err, FileError::IllegalArgument(_)));
    }

    #[tokio::test]
    async fn recover_rejects_nonexistent_files() {
        let rig = TestRig::new();
        let selector_fn: fn(&[crate::profile::FileVersion]) -> Option<&crate::profile::FileVersion> =
            |versions| versions.first();
        let selector: Arc<dyn VersionSelector> = Arc::new(selector_fn);
        let err = rig
            .manager()
            .recover(&rig.root().join("ghost.txt"), selector)
            .unwrap_err();
        assert!(matches!(err, FileError::NotFound(_)));
    }

    #[tokio::test]
    async fn share_guards() {
        let rig = TestRig::new();
        let file = rig.write_file("plain.txt", b"x");

        let err = rig
            .manager()
            .share(&file, "bob", PermissionType::Read)
            .unwrap_err();
        assert!(matches!(err, FileError::IllegalArgument(_)));

        let err = rig
            .manager()
            .share(rig.root(), "bob", PermissionType::Read)
            .unwrap_err();
        assert!(matches!(err, FileError::IllegalLocation(_)));

        let outside = tempfile::tempdir().expect("tempdir");
        let err = rig
            .manager()
            .share(outside.path(), "bob", PermissionType::Read)
            .unwrap_err();
        assert!(matches!(err, FileError::IllegalLocation(_)));
    }

    #[tokio::test]
    async fn operations_without_session_are_rejected() {
        let rig = TestRig::new();
        rig.node().close_session();

        let err = rig.manager().file_list().unwrap_err();
        assert!(matches!(err, FileError::NoSession));
    }

    #[tokio::test]
    async fn operations_without_connection_are_rejected() {
        let rig = TestRig::new();
        let file = rig.write_file("doc.txt", b"x");
        rig.overlay().set_connected(false);

        let err = rig.manager().add(&file).unwrap_err();
        assert!(matches!(err, FileError::NoPeerConnection));
    }
}
