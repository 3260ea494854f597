//! The share step.
//!
//! Sharing a folder hands control of its contents to a dedicated share
//! keypair: the meta document and chunk entries of every file under
//! the folder are protection-transferred to the share keys, and the
//! grant is recorded on the folder's index. After the transfer the
//! account keys alone can no longer modify the shared entries - which
//! is the point: whoever holds the share keys does.

use crate::context::ShareFolderContext;
use crate::session::Session;
use crate::steps::common;
use crate::{addressing, FileError};
use async_trait::async_trait;
use std::sync::Arc;
use syncmesh_dht::{Key160, ProtectionKeys};
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::info;

/// Transfers protection of the folder's contents to fresh share keys
/// and records the grant in the profile.
pub struct ShareFolderStep {
    session: Arc<Session>,
    ctx: Arc<ShareFolderContext>,
}

impl ShareFolderStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<ShareFolderContext>) -> Self {
        Self { session, ctx }
    }

    /// Every `(location, content)` tuple belonging to one file.
    async fn file_tuples(
        &self,
        meta_location: Key160,
    ) -> Result<Vec<(Key160, Key160)>, FileError> {
        let (_, document) = common::fetch_meta(&self.session, meta_location).await?;
        let mut tuples = vec![(meta_location, addressing::meta_content())];
        for version in &document.versions {
            for chunk in &version.chunk_keys {
                tuples.push((*chunk, addressing::chunk_content()));
            }
        }
        Ok(tuples)
    }

    async fn transfer_all(
        &self,
        tuples: &[(Key160, Key160)],
        from: &ProtectionKeys,
        to: &ProtectionKeys,
    ) -> Result<(), FileError> {
        let client = self.session.client();
        for (location, content) in tuples {
            client
                .transfer_protection(*location, addressing::domain_key(), *content, from, to)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessStep for ShareFolderStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;

        let profile = self
            .session
            .profiles()
            .snapshot()
            .await
            .map_err(common::to_process)?;
        let Some(folder) = profile.get_by_path(&self.ctx.relative_path) else {
            return Err(common::to_process(FileError::NotFound(format!(
                "'{}' is not in the profile",
                self.ctx.relative_path.display()
            ))));
        };
        if !folder.folder {
            return Err(common::to_process(FileError::IllegalArgument(
                "only folders can be shared".into(),
            )));
        }
        let folder_key = folder.file_key;

        // Collect every protected tuple under the folder, then rebind
        // them all to the share keys.
        let mut tuples = Vec::new();
        for index in profile.descendants_of(&self.ctx.relative_path) {
            if let Some(meta_location) = index.meta_location {
                tuples.extend(
                    self.file_tuples(meta_location)
                        .await
                        .map_err(common::to_process)?,
                );
            }
        }

        let share_keys = ProtectionKeys::generate();
        let account_keys = self.session.profiles().keys().clone();
        self.transfer_all(&tuples, &account_keys, &share_keys)
            .await
            .map_err(common::to_process)?;
        self.ctx.transferred.set(tuples)?;
        self.ctx.share_keys.set(share_keys)?;

        let permission = self.ctx.permission.clone();
        self.session
            .profiles()
            .update(move |profile| {
                if let Some(index) = profile.get_mut_by_key(folder_key) {
                    index.share = Some(permission);
                }
                Ok(())
            })
            .await
            .map_err(common::to_process)?;

        info!(
            "shared '{}' with {} ({})",
            self.ctx.relative_path.display(),
            self.ctx.permission.user_name,
            self.ctx.permission.permission
        );
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        // Undo in reverse: clear the grant, then rebind everything to
        // the account keys.
        let relative = self.ctx.relative_path.clone();
        self.session
            .profiles()
            .update(move |profile| {
                let folder_key = profile.get_by_path(&relative).map(|i| i.file_key);
                if let Some(key) = folder_key {
                    if let Some(index) = profile.get_mut_by_key(key) {
                        index.share = None;
                    }
                }
                Ok(())
            })
            .await
            .map_err(common::to_process)?;

        if let (Some(tuples), Some(share_keys)) =
            (self.ctx.transferred.clear(), self.ctx.share_keys.clear())
        {
            let account_keys = self.session.profiles().keys().clone();
            self.transfer_all(&tuples, &share_keys, &account_keys)
                .await
                .map_err(common::to_process)?;
        }
        Ok(())
    }
}
