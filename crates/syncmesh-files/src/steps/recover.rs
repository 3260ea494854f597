//! The recover step.
//!
//! Recovery brings an older stored version back as a sibling file:
//! `report.pdf` recovered at version 2 appears as `report-v2.pdf`.
//! The version to recover is chosen by the caller through the
//! [`VersionSelector`] callback.

use crate::context::RecoverFileContext;
use crate::profile::FileVersion;
use crate::session::Session;
use crate::steps::common;
use crate::FileError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use syncmesh_process::{ProcessError, ProcessStep, RollbackReason, StepEnv};
use tracing::info;

/// Chooses which stored version to recover.
///
/// Invoked once, mid-pipeline, with every known version of the file
/// (oldest first). Returning `None` fails the recovery.
pub trait VersionSelector: Send + Sync {
    /// Picks a version from the catalogue.
    fn select<'a>(&self, versions: &'a [FileVersion]) -> Option<&'a FileVersion>;
}

impl<F> VersionSelector for F
where
    F: for<'a> Fn(&'a [FileVersion]) -> Option<&'a FileVersion> + Send + Sync,
{
    fn select<'a>(&self, versions: &'a [FileVersion]) -> Option<&'a FileVersion> {
        self(versions)
    }
}

/// Downloads a selected version and writes it alongside the original.
pub struct RecoverFileStep {
    session: Arc<Session>,
    ctx: Arc<RecoverFileContext>,
    selector: Arc<dyn VersionSelector>,
}

impl RecoverFileStep {
    pub(crate) fn new(
        session: Arc<Session>,
        ctx: Arc<RecoverFileContext>,
        selector: Arc<dyn VersionSelector>,
    ) -> Self {
        Self {
            session,
            ctx,
            selector,
        }
    }
}

#[async_trait]
impl ProcessStep for RecoverFileStep {
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
        let Some(meta_location) = index.meta_location else {
            return Err(common::to_process(FileError::IllegalArgument(
                "a folder has one version only".into(),
            )));
        };

        let (_, document) = common::fetch_meta(&self.session, meta_location)
            .await
            .map_err(common::to_process)?;
        let Some(selected) = self.selector.select(&document.versions) else {
            return Err(common::to_process(FileError::IllegalArgument(
                "no version selected".into(),
            )));
        };
        info!(
            "recovering version {} of '{}'",
            selected.index,
            self.ctx.relative_path.display()
        );

        let data = common::fetch_chunks(&self.session, selected)
            .await
            .map_err(common::to_process)?;

        let target = recovered_path(
            &self.session.root().join(&self.ctx.relative_path),
            selected.index,
        );
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| common::to_process(FileError::from(e)))?;
        self.ctx.recovered.set(target)?;
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        if let Some(target) = self.ctx.recovered.clear() {
            tokio::fs::remove_file(&target)
                .await
                .map_err(|e| common::to_process(FileError::from(e)))?;
        }
        Ok(())
    }
}

/// `report.pdf` at version 2 recovers as `report-v2.pdf`.
fn recovered_path(original: &PathBuf, version_index: u32) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match original.extension() {
        Some(ext) => format!("{stem}-v{version_index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-v{version_index}"),
    };
    original.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovered_name_keeps_extension() {
        assert_eq!(
            recovered_path(&PathBuf::from("/r/docs/report.pdf"), 2),
            PathBuf::from("/r/docs/report-v2.pdf")
        );
        assert_eq!(
            recovered_path(&PathBuf::from("/r/LICENSE"), 0),
            PathBuf::from("/r/LICENSE-v0")
        );
    }

    #[test]
    fn closure_is_a_selector() {
        let versions = vec![
            FileVersion {
                index: 0,
                size: 1,
                chunk_keys: Vec::new(),
            },
            FileVersion {
                index: 1,
                size: 2,
                chunk_keys: Vec::new(),
            },
        ];
        let selector: fn(&[FileVersion]) -> Option<&FileVersion> = |versions| versions.first();
        assert_eq!(
            VersionSelector::select(&selector, &versions).map(|v| v.index),
            Some(0)
        );
    }
}
