//! Steps of the download pipeline.
//!
//! The pipeline starts with a single step: `find-in-profile`. What it
//! finds decides what runs next - a folder appends one
//! `create-folder` step, a file appends `get-meta-document` and
//! `download-chunks`. This is dynamic pipeline extension: the step
//! appends to its enclosing composite at runtime.

use crate::context::DownloadFileContext;
use crate::session::Session;
use crate::steps::common;
use crate::FileError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::info;

/// Looks the file key up in the user profile and extends the pipeline
/// with the steps the found kind needs.
pub struct FindInUserProfileStep {
    session: Arc<Session>,
    ctx: Arc<DownloadFileContext>,
}

impl FindInUserProfileStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DownloadFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for FindInUserProfileStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;

        let profile = self
            .session
            .profiles()
            .snapshot()
            .await
            .map_err(common::to_process)?;
        let Some(index) = profile.get_by_key(self.ctx.file_key) else {
            return Err(common::to_process(FileError::NotFound(
                "file key not found in user profile".into(),
            )));
        };
        let index = index.clone();
        self.ctx.index.set(index.clone())?;

        if index.folder {
            info!(
                "no download needed, '{}' is a folder",
                index.relative_path.display()
            );
            env.extend_step(
                "create-folder",
                CreateFolderStep::new(Arc::clone(&self.session), Arc::clone(&self.ctx)),
            );
        } else {
            info!("downloading '{}'", index.relative_path.display());
            env.extend_step(
                "get-meta-document",
                GetMetaDocumentStep::new(Arc::clone(&self.session), Arc::clone(&self.ctx)),
            );
            env.extend_step(
                "download-chunks",
                DownloadChunksStep::new(Arc::clone(&self.session), Arc::clone(&self.ctx)),
            );
        }
        Ok(())
    }
}

/// Creates the folder under the root.
pub struct CreateFolderStep {
    session: Arc<Session>,
    ctx: Arc<DownloadFileContext>,
}

impl CreateFolderStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DownloadFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for CreateFolderStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.index.get()?;
        let target = self.session.root().join(&index.relative_path);

        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| common::to_process(FileError::from(e)))?;
        self.ctx.downloaded.set(target)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(target) = self.ctx.downloaded.clear() {
            // Only an empty folder is ours to take back.
            let _ = tokio::fs::remove_dir(&target).await;
        }
        Ok(())
    }
}

/// Fetches the file's meta document.
pub struct GetMetaDocumentStep {
    session: Arc<Session>,
    ctx: Arc<DownloadFileContext>,
}

impl GetMetaDocumentStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DownloadFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for GetMetaDocumentStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.index.get()?;
        let Some(meta_location) = index.meta_location else {
            return Err(common::to_process(FileError::Codec(
                "file index has no meta location".into(),
            )));
        };

        let (_, document) = common::fetch_meta(&self.session, meta_location)
            .await
            .map_err(common::to_process)?;
        self.ctx.meta.set(document)?;
        Ok(())
    }
}

/// Fetches, decrypts and writes the newest version to disk.
pub struct DownloadChunksStep {
    session: Arc<Session>,
    ctx: Arc<DownloadFileContext>,
}

impl DownloadChunksStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DownloadFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for DownloadChunksStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.index.get()?;
        let document = self.ctx.meta.get()?;
        let Some(newest) = document.newest() else {
            return Err(common::to_process(FileError::Codec(
                "meta document has no versions".into(),
            )));
        };

        let data = common::fetch_chunks(&self.session, newest)
            .await
            .map_err(common::to_process)?;

        let target: PathBuf = self
            .ctx
            .destination
            .clone()
            .unwrap_or_else(|| self.session.root().join(&index.relative_path));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| common::to_process(FileError::from(e)))?;
        }
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| common::to_process(FileError::from(e)))?;

        self.ctx.downloaded.set(target)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(target) = self.ctx.downloaded.clear() {
            tokio::fs::remove_file(&target)
                .await
                .map_err(|e| common::to_process(FileError::from(e)))?;
        }
        Ok(())
    }
}
