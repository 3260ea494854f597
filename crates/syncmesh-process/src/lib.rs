//! Process framework for syncmesh.
//!
//! Every user-visible operation of the synchronization core - add,
//! update, move, delete, download, recover, share, list - is a
//! compound, long-running process. This crate provides the control
//! spine those operations are built from: a hierarchical state machine
//! with suspend/resume, background execution and deterministic rollback
//! on failure.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Core Layer                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  syncmesh-process : steps, composites, async wrapper ◄── HERE│
//! │  syncmesh-dht     : protected entry client, overlay          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Building Blocks
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ProcessState`] | The lifecycle every component obeys |
//! | [`ProcessStep`] | Hook trait for leaf work units |
//! | [`ProcessComponent`] | Leaf or composite with identity, state, progress, listeners |
//! | [`ExecutionPolicy`] | Sequential or concurrent child execution |
//! | [`ProcessControl`] | Pause/resume/cancel requests into a running tree |
//! | [`AsyncComponent`] | Background execution with a live handle |
//! | [`AsyncResultComponent`] | Background execution with a typed result |
//! | [`ContextSlot`] | Write-once context fields threaded through a pipeline |
//! | [`ProcessListener`] | Terminal-event sink |
//! | [`RollbackReason`] | Why a pipeline unwound |
//!
//! # Execution Model
//!
//! A composite owns its children exclusively; there is no parent
//! back-edge. A failure is a value: it propagates to the outermost
//! composite before any compensation runs, and the outermost drives
//! the unwind over the already-succeeded prefix in reverse completion
//! order. Cancellation is cooperative - a shared [`ProcessControl`]
//! carries requests that the tree observes between sequential children
//! and at step checkpoints - and idempotent once rollback has begun.
//!
//! # Example
//!
//! ```
//! use syncmesh_process::{
//!     AsyncComponent, ProcessComponent, ProcessError, ProcessState, ProcessStep, StepEnv,
//! };
//! use async_trait::async_trait;
//!
//! struct PutEntry;
//!
//! #[async_trait]
//! impl ProcessStep for PutEntry {
//!     async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
//!         env.checkpoint().await?;
//!         // ... one atomic subtask ...
//!         Ok(())
//!     }
//!
//!     async fn rollback(
//!         &mut self,
//!         _reason: &syncmesh_process::RollbackReason,
//!     ) -> Result<(), ProcessError> {
//!         // ... compensate ...
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut pipeline = ProcessComponent::sequential("add-file");
//! pipeline.add_step("put-entry", PutEntry).unwrap();
//!
//! let handle = AsyncComponent::new(pipeline);
//! handle.start().unwrap();
//! assert_eq!(handle.join().await, ProcessState::Succeeded);
//! # }
//! ```

mod asynchronous;
mod component;
mod composite;
mod context;
mod control;
mod error;
mod listener;
mod monitor;
mod reason;
mod state;
mod step;

pub mod testing;

pub use asynchronous::{AsyncComponent, AsyncResultComponent};
pub use component::ProcessComponent;
pub use composite::ExecutionPolicy;
pub use context::ContextSlot;
pub use control::ProcessControl;
pub use error::ProcessError;
pub use listener::ProcessListener;
pub use monitor::ProcessMonitor;
pub use reason::RollbackReason;
pub use state::ProcessState;
pub use step::{ProcessStep, StepEnv};
