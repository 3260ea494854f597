//! Steps of the update pipeline.
//!
//! `locate-index` → `fetch-meta-document` → `put-version-chunks` →
//! `append-version`. The new version's chunks are stored first; only
//! then does the meta document advance, so a failure between the two
//! rolls the orphaned chunks back and readers never see a version they
//! cannot fetch.

use crate::context::UpdateFileContext;
use crate::session::Session;
use crate::steps::common;
use crate::FileError;
use async_trait::async_trait;
use std::sync::Arc;
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::debug;

/// Resolves the file's index from the profile by path.
pub struct LocateIndexStep {
    session: Arc<Session>,
    ctx: Arc<UpdateFileContext>,
}

impl LocateIndexStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<UpdateFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for LocateIndexStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let profile = self
            .session
            .profiles()
            .snapshot()
            .await
            .map_err(common::to_process)?;
        let Some(index) = profile.get_by_path(&self.ctx.relative_path) else {
            return Err(common::to_process(FileError::NotFound(format!(
                "'{}' is not in the profile",
                self.ctx.relative_path.display()
            ))));
        };
        self.ctx.index.set(index.clone())?;
        Ok(())
    }
}

/// Fetches the current meta document (and its stored version key, for
/// lineage).
pub struct FetchMetaDocumentStep {
    session: Arc<Session>,
    ctx: Arc<UpdateFileContext>,
}

impl FetchMetaDocumentStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<UpdateFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for FetchMetaDocumentStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.index.get()?;
        let Some(meta_location) = index.meta_location else {
            return Err(common::to_process(FileError::Codec(
                "file index has no meta location".into(),
            )));
        };
        let fetched = common::fetch_meta(&self.session, meta_location)
            .await
            .map_err(common::to_process)?;
        self.ctx.meta.set(fetched)?;
        Ok(())
    }
}

/// Reads the new content and stores it as the next version's chunks.
pub struct PutVersionChunksStep {
    session: Arc<Session>,
    ctx: Arc<UpdateFileContext>,
}

impl PutVersionChunksStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<UpdateFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for PutVersionChunksStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.index.get()?;
        let (_, document) = self.ctx.meta.get()?;
        let Some(meta_location) = index.meta_location else {
            return Err(common::to_process(FileError::Codec(
                "file index has no meta location".into(),
            )));
        };

        let data = tokio::fs::read(&self.ctx.absolute_path)
            .await
            .map_err(|e| common::to_process(FileError::from(e)))?;
        let version =
            common::put_chunks(&self.session, meta_location, document.next_index(), &data)
                .await
                .map_err(common::to_process)?;
        debug!(
            "stored version {} of '{}' ({} chunk(s))",
            version.index,
            self.ctx.relative_path.display(),
            version.chunk_keys.len()
        );
        self.ctx.chunks.set(version)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(version) = self.ctx.chunks.clear() {
            common::remove_chunks(&self.session, &version)
                .await
                .map_err(common::to_process)?;
        }
        Ok(())
    }
}

/// Appends the new version to the meta document and stores its
/// successor.
pub struct AppendVersionStep {
    session: Arc<Session>,
    ctx: Arc<UpdateFileContext>,
}

impl AppendVersionStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<UpdateFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for AppendVersionStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.index.get()?;
        let (stored_version, mut document) = self.ctx.meta.get()?;
        let Some(meta_location) = index.meta_location else {
            return Err(common::to_process(FileError::Codec(
                "file index has no meta location".into(),
            )));
        };

        document.versions.push(self.ctx.chunks.get()?);
        let new_version =
            common::put_meta(&self.session, meta_location, &document, stored_version)
                .await
                .map_err(common::to_process)?;
        self.ctx.new_meta_version.set(new_version)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(new_version) = self.ctx.new_meta_version.clear() {
            let index = self.ctx.index.get()?;
            if let Some(meta_location) = index.meta_location {
                common::remove_meta_version(&self.session, meta_location, new_version)
                    .await
                    .map_err(common::to_process)?;
            }
        }
        Ok(())
    }
}
