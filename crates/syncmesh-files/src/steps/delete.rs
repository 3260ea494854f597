//! Steps of the "delete file" pipeline.
//!
//! `remove-from-profile` → `remove-meta-document` → `remove-chunks`.
//! Every step keeps what it removed in the context, so rollback can
//! put a half-deleted file back together in reverse order. Folders
//! only run the profile step.

use crate::context::{DeleteFileContext, RemovedMetaDocument};
use crate::session::Session;
use crate::steps::common;
use crate::{addressing, FileError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use syncmesh_dht::Key160;
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::debug;

/// Removes the index from the profile, keeping it for rollback.
pub struct RemoveFromProfileStep {
    session: Arc<Session>,
    ctx: Arc<DeleteFileContext>,
}

impl RemoveFromProfileStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DeleteFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for RemoveFromProfileStep {
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
        let file_key = index.file_key;

        let removed = self
            .session
            .profiles()
            .update(move |profile| {
                profile.remove(file_key);
                Ok(())
            })
            .await
            .map_err(common::to_process)
            .map(|_| index.clone())?;

        debug!("removed '{}' from profile", removed.relative_path.display());
        self.ctx.removed_index.set(removed)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(index) = self.ctx.removed_index.clear() {
            self.session
                .profiles()
                .update(move |profile| {
                    profile.insert(index);
                    Ok(())
                })
                .await
                .map_err(common::to_process)?;
        }
        Ok(())
    }
}

/// Removes every stored meta document version, keeping the newest for
/// rollback.
pub struct RemoveMetaDocumentStep {
    session: Arc<Session>,
    ctx: Arc<DeleteFileContext>,
}

impl RemoveMetaDocumentStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DeleteFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for RemoveMetaDocumentStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let index = self.ctx.removed_index.get()?;
        let Some(meta_location) = index.meta_location else {
            return Err(common::to_process(FileError::Codec(
                "file index has no meta location".into(),
            )));
        };

        let (version, based_on, document) =
            common::fetch_meta_entry(&self.session, meta_location)
                .await
                .map_err(common::to_process)?;
        common::remove_all_meta(&self.session, meta_location)
            .await
            .map_err(common::to_process)?;

        self.ctx.removed_meta.set(RemovedMetaDocument {
            version,
            based_on,
            document,
        })?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(removed) = self.ctx.removed_meta.clear() {
            let index = self.ctx.removed_index.get()?;
            if let Some(meta_location) = index.meta_location {
                // Back under the exact version key and lineage
                // reference it was removed from.
                common::restore_meta(
                    &self.session,
                    meta_location,
                    &removed.document,
                    removed.version,
                    removed.based_on,
                )
                .await
                .map_err(common::to_process)?;
            }
        }
        Ok(())
    }
}

/// Removes the chunks of every version, keeping the sealed payloads
/// for rollback.
pub struct RemoveChunksStep {
    session: Arc<Session>,
    ctx: Arc<DeleteFileContext>,
}

impl RemoveChunksStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<DeleteFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for RemoveChunksStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let removed_meta = self.ctx.removed_meta.get()?;

        let client = self.session.client();
        let keys = self.session.profiles().keys();
        let mut removed = Vec::new();
        for version in &removed_meta.document.versions {
            env.checkpoint().await?;
            for location in &version.chunk_keys {
                if let Some(entry) = client
                    .get(
                        *location,
                        addressing::domain_key(),
                        addressing::chunk_content(),
                        Key160::ZERO,
                    )
                    .await
                    .map_err(|e| common::to_process(FileError::from(e)))?
                {
                    removed.push((*location, entry.payload().clone()));
                }
                client
                    .remove(
                        *location,
                        addressing::domain_key(),
                        addressing::chunk_content(),
                        Key160::ZERO,
                        keys,
                    )
                    .await
                    .map_err(|e| common::to_process(FileError::from(e)))?;
            }
        }
        debug!(
            "removed {} chunk(s) of '{}'",
            removed.len(),
            self.ctx.relative_path.display()
        );
        self.ctx.removed_chunks.set(removed)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(removed) = self.ctx.removed_chunks.clear() {
            let client = self.session.client();
            let keys = self.session.profiles().keys();
            for (location, payload) in removed {
                client
                    .put(
                        location,
                        addressing::domain_key(),
                        addressing::chunk_content(),
                        Key160::ZERO,
                        Key160::ZERO,
                        Bytes::from(payload),
                        keys,
                    )
                    .await
                    .map_err(|e| common::to_process(FileError::from(e)))?;
            }
        }
        Ok(())
    }
}
