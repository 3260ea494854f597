//! File synchronization layer of syncmesh.
//!
//! Everything a user does to their synchronized tree - add, update,
//! move, delete, download, recover, share, list - runs as a pipeline
//! of process steps over the protected overlay. This crate supplies
//! the pieces and the façade that assembles them.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  syncmesh-files   : profile, steps, factory, façade ◄── HERE │
//! └─────────────────────────────────────────────────────────────┘
//!          │ pipelines                  │ entries
//!          ▼                            ▼
//! ┌──────────────────────┐   ┌──────────────────────────────────┐
//! │  syncmesh-process    │   │  syncmesh-dht                    │
//! │  steps, composites,  │   │  protected entries, overlay      │
//! │  async wrapper       │   │                                  │
//! └──────────────────────┘   └──────────────────────────────────┘
//! ```
//!
//! # Data Flow
//!
//! A façade call asks the [`ProcessFactory`] to assemble a composite
//! of steps; each step reads and writes a shared typed context; the
//! composite is wrapped for background execution and submitted. On any
//! step failure, rollback unwinds the already-succeeded steps in
//! reverse order; the terminal state is delivered via listeners and -
//! for the list operation - a result slot.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use syncmesh_dht::{MemoryOverlay, ProtectedEntryClient};
//! use syncmesh_files::{FileManager, Session, SyncConfig, SyncNode};
//! use syncmesh_types::UserId;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), syncmesh_files::FileError> {
//! let overlay = Arc::new(MemoryOverlay::new());
//! let client = Arc::new(ProtectedEntryClient::new(overlay));
//! let node = Arc::new(SyncNode::new(Arc::clone(&client)));
//! node.open_session(Session::new(
//!     PathBuf::from("/sync/alice"),
//!     UserId::from_name("alice"),
//!     b"credentials",
//!     client,
//!     SyncConfig::default(),
//! ));
//!
//! let manager = FileManager::new(node);
//! let handle = manager.add(&PathBuf::from("/sync/alice/docs"))?;
//! handle.join().await;
//! # Ok(())
//! # }
//! ```

pub mod addressing;
mod chunk;
mod config;
mod context;
mod error;
mod factory;
mod manager;
mod profile;
mod recursion;
mod session;
mod steps;

#[cfg(test)]
mod test_support;

pub use chunk::{ChaChaChunkCipher, ChunkCipher};
pub use config::{SyncConfig, DEFAULT_CHUNK_SIZE};
pub use context::{
    AddFileContext, DeleteFileContext, DownloadFileContext, FileListContext, MoveFileContext,
    RecoverFileContext, RemovedMetaDocument, ShareFolderContext, UpdateFileContext,
};
pub use error::FileError;
pub use factory::ProcessFactory;
pub use manager::FileManager;
pub use profile::{FileIndex, FileVersion, MetaDocument, ProfileManager, UserProfile};
pub use recursion::{postorder, preorder};
pub use session::{Session, SyncNode};
pub use steps::{
    AddToProfileStep, AppendVersionStep, CreateFolderStep, DownloadChunksStep, FetchMetaDocumentStep,
    FileListStep, FindInUserProfileStep, GetMetaDocumentStep, LocateIndexStep, MoveFileStep,
    PutChunksStep, PutMetaDocumentStep, PutVersionChunksStep, RecoverFileStep, RemoveChunksStep,
    RemoveFromProfileStep, RemoveMetaDocumentStep, ShareFolderStep, VersionSelector,
};
