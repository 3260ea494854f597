//! The file-list step.
//!
//! Result-bearing: writes the sorted list of known paths into the
//! result slot the async wrapper exposes.

use crate::context::FileListContext;
use crate::session::Session;
use crate::steps::common;
use async_trait::async_trait;
use std::sync::Arc;
use syncmesh_process::{ProcessError, ProcessStep, StepEnv};

/// Produces the current list of known relative paths from the profile.
pub struct FileListStep {
    session: Arc<Session>,
    ctx: Arc<FileListContext>,
}

impl FileListStep {
    pub(crate) fn new(session: Arc<Session>, ctx: Arc<FileListContext>) -> Self {
        Self { session, ctx }
    }
}

#[async_trait]
impl ProcessStep for FileListStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        let profile = self
            .session
            .profiles()
            .snapshot()
            .await
            .map_err(common::to_process)?;
        self.ctx.result.set(profile.paths())?;
        Ok(())
    }
}
