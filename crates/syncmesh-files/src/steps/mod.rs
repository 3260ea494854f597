//! Steps of the file pipelines.
//!
//! Every step has the same shape: validate, read from the context,
//! perform one atomic subtask, write to the context - and, for the
//! download lookup, extend the pipeline. The factory wires steps into
//! composites per user operation.

mod add;
mod common;
mod delete;
mod download;
mod list;
mod move_file;
mod recover;
mod share;
mod update;

pub use add::{AddToProfileStep, PutChunksStep, PutMetaDocumentStep};
pub use delete::{RemoveChunksStep, RemoveFromProfileStep, RemoveMetaDocumentStep};
pub use download::{
    CreateFolderStep, DownloadChunksStep, FindInUserProfileStep, GetMetaDocumentStep,
};
pub use list::FileListStep;
pub use move_file::MoveFileStep;
pub use recover::{RecoverFileStep, VersionSelector};
pub use share::ShareFolderStep;
pub use update::{AppendVersionStep, FetchMetaDocumentStep, LocateIndexStep, PutVersionChunksStep};
