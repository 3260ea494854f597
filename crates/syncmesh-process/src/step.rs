//! Step trait and execution environment.
//!
//! A step is the leaf execution unit of the framework: one atomic
//! subtask of a user-visible operation. Steps supply hooks - the state
//! machine itself lives in [`ProcessComponent`](crate::ProcessComponent)
//! and is implemented exactly once.
//!
//! # Step Shape
//!
//! The general shape of a step is:
//!
//! ```text
//! validate → read-from-context → perform one atomic subtask
//!          → write-to-context → optionally extend the pipeline
//! ```
//!
//! Steps never unwind by panic. A failure is a returned
//! [`ProcessError`]; the enclosing composite's state machine consumes
//! it and drives the rollback.
//!
//! # Dynamic Pipeline Extension
//!
//! A step may append follow-on steps to its enclosing composite while
//! executing, via [`StepEnv::extend`]. This is how a step can decide at
//! runtime whether a download needs one step (a folder) or two (a
//! file). Appended steps run after the current step completes, before
//! the composite considers itself finished.
//!
//! # Example
//!
//! ```
//! use syncmesh_process::{ProcessError, ProcessStep, StepEnv};
//! use async_trait::async_trait;
//!
//! struct SayHello;
//!
//! #[async_trait]
//! impl ProcessStep for SayHello {
//!     async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
//!         env.checkpoint().await?;
//!         println!("hello");
//!         Ok(())
//!     }
//! }
//! ```

use crate::monitor::ProcessMonitor;
use crate::{ProcessComponent, ProcessControl, ProcessError, ProcessState, RollbackReason};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hooks supplied by a leaf step.
///
/// | Hook | When | Default |
/// |------|------|---------|
/// | `execute` | Forward pass | - (required) |
/// | `rollback` | Compensation after the step succeeded, or after it was cancelled mid-run | Ok |
/// | `on_pause` | Pause honored at a step boundary | no-op |
/// | `on_resume` | Resume of forward execution | no-op |
/// | `on_resume_rollback` | Resume of rollback | no-op |
///
/// A step that fails its own `execute` never gets its `rollback` hook -
/// it never succeeded, so there is nothing to compensate. A step
/// *cancelled* while running does get the hook, since partial effects
/// may exist.
#[async_trait]
pub trait ProcessStep: Send + Sync {
    /// Performs the step's forward work.
    ///
    /// Long-running steps should call [`StepEnv::checkpoint`]
    /// periodically so pause and cancel requests are honored
    /// cooperatively.
    ///
    /// # Errors
    ///
    /// Any error triggers rollback of the enclosing pipeline.
    /// [`ProcessError::Aborted`] marks a cancel observed at a
    /// checkpoint.
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError>;

    /// Compensates the step's effects.
    ///
    /// Invoked in reverse completion order when the pipeline unwinds.
    /// A failing rollback does not stop the unwind; it is logged and
    /// the component still reaches `Failed`.
    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        Ok(())
    }

    /// Pause honored at a step boundary.
    fn on_pause(&mut self) {}

    /// Forward execution resuming after a pause.
    fn on_resume(&mut self) {}

    /// Rollback resuming after a pause.
    fn on_resume_rollback(&mut self) {}
}

/// Execution environment handed to a step's `execute` hook.
///
/// Provides the two services a step may need from the framework:
/// cooperative suspension ([`checkpoint`](Self::checkpoint)) and
/// dynamic pipeline extension ([`extend`](Self::extend)).
pub struct StepEnv<'a> {
    monitor: Arc<ProcessMonitor>,
    control: Arc<ProcessControl>,
    scopes: Vec<Arc<AtomicBool>>,
    appended: &'a mut Vec<ProcessComponent>,
}

impl<'a> StepEnv<'a> {
    pub(crate) fn new(
        monitor: Arc<ProcessMonitor>,
        control: Arc<ProcessControl>,
        scopes: Vec<Arc<AtomicBool>>,
        appended: &'a mut Vec<ProcessComponent>,
    ) -> Self {
        Self {
            monitor,
            control,
            scopes,
            appended,
        }
    }

    /// Cooperative suspension point.
    ///
    /// - If a cancel was requested (or a sibling failed in a concurrent
    ///   composite), returns [`ProcessError::Aborted`].
    /// - If a pause was requested, parks the step (component state
    ///   `Paused`) until resumed or cancelled.
    /// - Otherwise returns immediately.
    pub async fn checkpoint(&self) -> Result<(), ProcessError> {
        if self.aborted() {
            return Err(ProcessError::Aborted);
        }
        if self.control.pause_requested() {
            self.monitor.transition(ProcessState::Paused)?;
            let interrupted = self.control.wait_resume(&self.scopes).await;
            if interrupted.is_some() {
                // Leave the Paused state; the abort path transitions
                // Paused -> Rollbacking.
                return Err(ProcessError::Aborted);
            }
            self.monitor.transition(ProcessState::Running)?;
        }
        Ok(())
    }

    /// Returns `true` if a cancel or sibling abort is pending.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.control.cancel_requested().is_some()
            || self.scopes.iter().any(|s| s.load(Ordering::Acquire))
    }

    /// Appends a component to the enclosing composite.
    ///
    /// The appended component runs after the current step completes,
    /// before the composite considers itself finished. Only legal while
    /// the composite is running - which is guaranteed by construction,
    /// since the environment only exists inside `execute`.
    pub fn extend(&mut self, component: ProcessComponent) {
        self.appended.push(component);
    }

    /// Convenience: appends a named leaf step.
    pub fn extend_step(&mut self, name: impl Into<String>, step: impl ProcessStep + 'static) {
        self.appended.push(ProcessComponent::step(name, step));
    }
}

impl std::fmt::Debug for StepEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEnv")
            .field("component", &self.monitor.name())
            .field("appended", &self.appended.len())
            .finish()
    }
}
