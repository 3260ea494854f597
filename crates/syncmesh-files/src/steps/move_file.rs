//! The move step.
//!
//! A move is a profile re-pathing: the file's content and meta
//! document stay where they are, only the index paths change. Moving
//! a folder re-prefixes every descendant.

use crate::context::MoveFileContext;
use crate::session::Session;
use crate::steps::common;
use crate::FileError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use syncmesh_dht::Key160;
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::debug;

/// Re-paths the source index (and its descendants) to the destination.
pub struct MoveFileStep {
    session: Arc<Session>,
    ctx: Arc<MoveFileContext>,
}

impl MoveFileStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<MoveFileContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for MoveFileStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let source = self.ctx.source.clone();
        let destination = self.ctx.destination.clone();
        let mut moved: Vec<(Key160, PathBuf)> = Vec::new();

        self.session
            .profiles()
            .update(|profile| {
                let Some(index) = profile.get_by_path(&source) else {
                    return Err(FileError::NotFound(format!(
                        "'{}' is not in the profile",
                        source.display()
                    )));
                };
                if profile.get_by_path(&destination).is_some() {
                    return Err(FileError::IllegalArgument(format!(
                        "'{}' is already in the profile",
                        destination.display()
                    )));
                }

                let mut affected = vec![index.file_key];
                if index.folder {
                    affected.extend(profile.descendants_of(&source).iter().map(|i| i.file_key));
                }

                for file_key in affected {
                    if let Some(entry) = profile.get_mut_by_key(file_key) {
                        let old = entry.relative_path.clone();
                        let suffix = old
                            .strip_prefix(&source)
                            .map(PathBuf::from)
                            .unwrap_or_default();
                        entry.relative_path = destination.join(suffix);
                        moved.push((file_key, old));
                    }
                }
                Ok(())
            })
            .await
            .map_err(common::to_process)?;

        debug!(
            "moved '{}' -> '{}' ({} index(es))",
            self.ctx.source.display(),
            self.ctx.destination.display(),
            moved.len()
        );
        self.ctx.moved.set(moved)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(moved) = self.ctx.moved.clear() {
            self.session
                .profiles()
                .update(move |profile| {
                    for (file_key, old_path) in moved {
                        if let Some(entry) = profile.get_mut_by_key(file_key) {
                            entry.relative_path = old_path;
                        }
                    }
                    Ok(())
                })
                .await
                .map_err(common::to_process)?;
        }
        Ok(())
    }
}
