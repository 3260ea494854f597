//! Pipeline assembly.
//!
//! The factory turns one user operation into one process component:
//! a single step, a step pipeline, or - for directory trees - a
//! sequential composite of per-path pipelines ordered so that parents
//! are created before their children and deleted after them.

use crate::context::{
    AddFileContext, DeleteFileContext, DownloadFileContext, FileListContext, MoveFileContext,
    RecoverFileContext, ShareFolderContext, UpdateFileContext,
};
use crate::recursion;
use crate::session::Session;
use crate::steps::{
    AddToProfileStep, AppendVersionStep, FetchMetaDocumentStep, FileListStep,
    FindInUserProfileStep, LocateIndexStep, MoveFileStep, PutChunksStep, PutMetaDocumentStep,
    PutVersionChunksStep, RecoverFileStep, RemoveChunksStep, RemoveFromProfileStep,
    RemoveMetaDocumentStep, ShareFolderStep, VersionSelector,
};
use crate::FileError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncmesh_dht::Key160;
use syncmesh_process::{ContextSlot, ProcessComponent};
use syncmesh_types::UserPermission;

/// Builds the process graph of each user operation.
pub struct ProcessFactory {
    session: Arc<Session>,
}

impl ProcessFactory {
    /// Creates a factory bound to one session.
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// The pipeline storing one new path: chunks, meta document,
    /// profile entry (folders only get the profile entry).
    pub fn new_file_process(&self, absolute: &Path) -> Result<ProcessComponent, FileError> {
        let relative = self.session.relativize(absolute)?;
        let folder = absolute.is_dir();
        let ctx = AddFileContext::new(absolute.to_path_buf(), relative.clone(), folder);

        let mut pipeline =
            ProcessComponent::sequential(format!("new-file {}", relative.display()));
        if !folder {
            pipeline.add_step(
                "put-chunks",
                PutChunksStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
            )?;
            pipeline.add_step(
                "put-meta-document",
                PutMetaDocumentStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
            )?;
        }
        pipeline.add_step(
            "add-to-profile",
            AddToProfileStep::new(Arc::clone(&self.session), ctx),
        )?;
        Ok(pipeline)
    }

    /// The add operation: a directory with contents becomes a
    /// sequential composite over its preorder path list, so parents
    /// exist before children; anything else is a single new-file
    /// pipeline.
    pub fn add_process(&self, absolute: &Path) -> Result<ProcessComponent, FileError> {
        if absolute.is_dir() && has_entries(absolute)? {
            let relative = self.session.relativize(absolute)?;
            let mut composite =
                ProcessComponent::sequential(format!("add-tree {}", relative.display()));
            for path in recursion::preorder(absolute)? {
                composite.add(self.new_file_process(&path)?)?;
            }
            Ok(composite)
        } else {
            self.new_file_process(absolute)
        }
    }

    /// The update operation: locate, fetch meta, store the next
    /// version's chunks, append the version.
    pub fn update_process(&self, absolute: &Path) -> Result<ProcessComponent, FileError> {
        let relative = self.session.relativize(absolute)?;
        let ctx = UpdateFileContext::new(absolute.to_path_buf(), relative.clone());

        let mut pipeline = ProcessComponent::sequential(format!("update {}", relative.display()));
        pipeline.add_step(
            "locate-index",
            LocateIndexStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
        )?;
        pipeline.add_step(
            "fetch-meta-document",
            FetchMetaDocumentStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
        )?;
        pipeline.add_step(
            "put-version-chunks",
            PutVersionChunksStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
        )?;
        pipeline.add_step(
            "append-version",
            AppendVersionStep::new(Arc::clone(&self.session), ctx),
        )?;
        Ok(pipeline)
    }

    /// The move operation: a single profile re-pathing step.
    pub fn move_process(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<ProcessComponent, FileError> {
        let source_rel = self.session.relativize(source)?;
        let destination_rel = self.session.relativize(destination)?;
        let ctx = MoveFileContext::new(source_rel.clone(), destination_rel);
        Ok(ProcessComponent::step(
            format!("move-file {}", source_rel.display()),
            MoveFileStep::new(Arc::clone(&self.session), ctx),
        ))
    }

    /// The pipeline deleting one path. Files drop their profile entry,
    /// meta document and chunks; folders only the profile entry.
    pub fn delete_file_process(&self, absolute: &Path) -> Result<ProcessComponent, FileError> {
        let relative = self.session.relativize(absolute)?;
        let folder = absolute.is_dir();
        let ctx = DeleteFileContext::new(relative.clone());

        let mut pipeline =
            ProcessComponent::sequential(format!("delete-file {}", relative.display()));
        pipeline.add_step(
            "remove-from-profile",
            RemoveFromProfileStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
        )?;
        if !folder {
            pipeline.add_step(
                "remove-meta-document",
                RemoveMetaDocumentStep::new(Arc::clone(&self.session), Arc::clone(&ctx)),
            )?;
            pipeline.add_step(
                "remove-chunks",
                RemoveChunksStep::new(Arc::clone(&self.session), ctx),
            )?;
        }
        Ok(pipeline)
    }

    /// The delete operation: a directory with contents becomes a
    /// sequential composite over the reverse preorder - postorder -
    /// path list, so children vanish before parents.
    pub fn delete_process(&self, absolute: &Path) -> Result<ProcessComponent, FileError> {
        if absolute.is_dir() && has_entries(absolute)? {
            let relative = self.session.relativize(absolute)?;
            let mut composite =
                ProcessComponent::sequential(format!("delete-tree {}", relative.display()));
            for path in recursion::postorder(absolute)? {
                composite.add(self.delete_file_process(&path)?)?;
            }
            Ok(composite)
        } else {
            self.delete_file_process(absolute)
        }
    }

    /// The download operation: one lookup step that extends the
    /// pipeline with what the found kind needs.
    pub fn download_process(
        &self,
        file_key: Key160,
        destination: Option<PathBuf>,
    ) -> Result<ProcessComponent, FileError> {
        let ctx = DownloadFileContext::new(file_key, destination);
        let mut pipeline = ProcessComponent::sequential(format!("download {file_key}"));
        pipeline.add_step(
            "find-in-profile",
            FindInUserProfileStep::new(Arc::clone(&self.session), ctx),
        )?;
        Ok(pipeline)
    }

    /// The recover operation: a single step driving the caller's
    /// version selector.
    pub fn recover_process(
        &self,
        absolute: &Path,
        selector: Arc<dyn VersionSelector>,
    ) -> Result<ProcessComponent, FileError> {
        let relative = self.session.relativize(absolute)?;
        let ctx = RecoverFileContext::new(relative.clone());
        Ok(ProcessComponent::step(
            format!("recover-file {}", relative.display()),
            RecoverFileStep::new(Arc::clone(&self.session), ctx, selector),
        ))
    }

    /// The share operation: a single step.
    pub fn share_process(
        &self,
        folder: &Path,
        permission: UserPermission,
    ) -> Result<ProcessComponent, FileError> {
        let relative = self.session.relativize(folder)?;
        let ctx = ShareFolderContext::new(relative.clone(), permission);
        Ok(ProcessComponent::step(
            format!("share {}", relative.display()),
            ShareFolderStep::new(Arc::clone(&self.session), ctx),
        ))
    }

    /// The file-list operation. Returns the component and the result
    /// slot it fills.
    #[must_use]
    pub fn file_list_process(&self) -> (ProcessComponent, Arc<ContextSlot<Vec<PathBuf>>>) {
        let ctx = FileListContext::new();
        let result = Arc::clone(&ctx.result);
        let component = ProcessComponent::step(
            "file-list",
            FileListStep::new(Arc::clone(&self.session), ctx),
        );
        (component, result)
    }
}

fn has_entries(path: &Path) -> Result<bool, FileError> {
    Ok(std::fs::read_dir(path)?.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRig;

    fn child_names(component: &ProcessComponent) -> Vec<String> {
        component
            .children()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn add_tree_is_preorder() {
        let rig = TestRig::new();
        rig.write_file("a/b/file.txt", b"content");

        let factory = ProcessFactory::new(rig.session());
        let process = factory.add_process(&rig.root().join("a")).expect("built");

        assert_eq!(
            child_names(&process),
            vec!["new-file a", "new-file a/b", "new-file a/b/file.txt"]
        );
    }

    #[tokio::test]
    async fn delete_tree_is_postorder() {
        let rig = TestRig::new();
        rig.write_file("a/b/file.txt", b"content");

        let factory = ProcessFactory::new(rig.session());
        let process = factory.delete_process(&rig.root().join("a")).expect("built");

        assert_eq!(
            child_names(&process),
            vec![
                "delete-file a/b/file.txt",
                "delete-file a/b",
                "delete-file a"
            ]
        );
    }

    #[tokio::test]
    async fn single_file_add_has_three_steps() {
        let rig = TestRig::new();
        let file = rig.write_file("doc.txt", b"content");

        let factory = ProcessFactory::new(rig.session());
        let process = factory.add_process(&file).expect("built");

        assert_eq!(
            child_names(&process),
            vec!["put-chunks", "put-meta-document", "add-to-profile"]
        );
    }

    #[tokio::test]
    async fn empty_directory_add_is_a_single_profile_step() {
        let rig = TestRig::new();
        let dir = rig.root().join("empty");
        std::fs::create_dir(&dir).expect("dir");

        let factory = ProcessFactory::new(rig.session());
        let process = factory.add_process(&dir).expect("built");

        assert_eq!(child_names(&process), vec!["add-to-profile"]);
    }

    #[tokio::test]
    async fn download_of_a_folder_extends_with_create_folder_only() {
        let rig = TestRig::new();
        let dir = rig.root().join("folder");
        std::fs::create_dir(&dir).expect("dir");

        // Register the folder first.
        let factory = ProcessFactory::new(rig.session());
        let mut add = factory.add_process(&dir).expect("built");
        add.start().await.expect("added");

        let file_key = rig
            .session()
            .profiles()
            .snapshot()
            .await
            .expect("profile")
            .get_by_path(std::path::Path::new("folder"))
            .expect("registered")
            .file_key;

        // Remove it locally, then download by key.
        std::fs::remove_dir(&dir).expect("removed");
        let mut download = factory.download_process(file_key, None).expect("built");
        download.start().await.expect("downloaded");

        // The lookup appended exactly one step: create-folder. No
        // meta or chunk steps for a folder.
        assert_eq!(
            child_names(&download),
            vec!["find-in-profile", "create-folder"]
        );
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn download_of_a_file_extends_with_meta_and_chunks() {
        let rig = TestRig::new();
        let file = rig.write_file("doc.txt", b"chunked content across several chunks");

        let factory = ProcessFactory::new(rig.session());
        let mut add = factory.add_process(&file).expect("built");
        add.start().await.expect("added");

        let file_key = rig
            .session()
            .profiles()
            .snapshot()
            .await
            .expect("profile")
            .get_by_path(std::path::Path::new("doc.txt"))
            .expect("registered")
            .file_key;

        std::fs::remove_file(&file).expect("removed");
        let mut download = factory.download_process(file_key, None).expect("built");
        download.start().await.expect("downloaded");

        assert_eq!(
            child_names(&download),
            vec!["find-in-profile", "get-meta-document", "download-chunks"]
        );
        assert_eq!(
            std::fs::read(&file).expect("restored"),
            b"chunked content across several chunks"
        );
    }

    #[tokio::test]
    async fn download_of_unknown_key_fails() {
        let rig = TestRig::new();
        let factory = ProcessFactory::new(rig.session());

        let mut download = factory
            .download_process(Key160::hash("unknown"), None)
            .expect("built");
        let err = download.start().await.unwrap_err();
        assert!(err.to_string().contains("not found in user profile"));
    }
}
