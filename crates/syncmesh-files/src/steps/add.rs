//! Steps of the "new file" pipeline.
//!
//! One added path runs `put-chunks` → `put-meta-document` →
//! `add-to-profile` (folders skip straight to the profile step). Each
//! step compensates exactly what it stored, so a failed add leaves the
//! overlay and the profile as they were.

use crate::context::AddFileContext;
use crate::profile::{FileIndex, MetaDocument};
use crate::session::Session;
use crate::steps::common;
use crate::FileError;
use async_trait::async_trait;
use std::sync::Arc;
use syncmesh_dht::Key160;
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::debug;

/// Reads the file, encrypts its chunks and stores them.
///
/// Writes the initial [`FileVersion`](crate::profile::FileVersion)
/// into the context.
pub struct PutChunksStep {
    session: Arc<Session>,
    ctx: Arc<AddFileContext>,
}

impl PutChunksStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<AddFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for PutChunksStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let data = tokio::fs::read(&self.ctx.absolute_path)
            .await
            .map_err(|e| common::to_process(FileError::from(e)))?;

        let version = common::put_chunks(&self.session, self.ctx.meta_location, 0, &data)
            .await
            .map_err(common::to_process)?;
        debug!(
            "stored {} chunk(s) for '{}'",
            version.chunk_keys.len(),
            self.ctx.relative_path.display()
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

/// Stores the initial meta document for the file.
pub struct PutMetaDocumentStep {
    session: Arc<Session>,
    ctx: Arc<AddFileContext>,
}

impl PutMetaDocumentStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<AddFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for PutMetaDocumentStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let initial = self.ctx.chunks.get()?;
        let document = MetaDocument::new(self.ctx.file_key, initial);

        let version =
            common::put_meta(&self.session, self.ctx.meta_location, &document, Key160::ZERO)
                .await
                .map_err(common::to_process)?;
        self.ctx.meta_version.set(version)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(version) = self.ctx.meta_version.clear() {
            common::remove_meta_version(&self.session, self.ctx.meta_location, version)
                .await
                .map_err(common::to_process)?;
        }
        Ok(())
    }
}

/// Records the file (or folder) in the user profile.
pub struct AddToProfileStep {
    session: Arc<Session>,
    ctx: Arc<AddFileContext>,
}

impl AddToProfileStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<AddFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for AddToProfileStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;

        let index = if self.ctx.folder {
            FileIndex::directory(self.ctx.file_key, self.ctx.relative_path.clone())
        } else {
            FileIndex::file(
                self.ctx.file_key,
                self.ctx.relative_path.clone(),
                self.ctx.meta_location,
            )
        };

        let relative = self.ctx.relative_path.clone();
        let inserted = index.clone();
        self.session
            .profiles()
            .update(move |profile| {
                if profile.get_by_path(&relative).is_some() {
                    return Err(FileError::IllegalArgument(format!(
                        "'{}' is already in the profile",
                        relative.display()
                    )));
                }
                profile.insert(inserted);
                Ok(())
            })
            .await
            .map_err(common::to_process)?;

        self.ctx.index.set(index)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(index) = self.ctx.index.clear() {
            self.session
                .profiles()
                .update(move |profile| {
                    profile.remove(index.file_key);
                    Ok(())
                })
                .await
                .map_err(common::to_process)?;
        }
        Ok(())
    }
}
