//! Asynchronous execution wrappers.
//!
//! [`AsyncComponent`] adapts a process component for background
//! execution: `start` returns immediately and the component runs on a
//! worker task. The handle stays live - state, progress, listeners and
//! control requests all work while the tree executes elsewhere.
//!
//! [`AsyncResultComponent`] additionally exposes a single-shot typed
//! result the wrapped pipeline produces before succeeding.
//!
//! # Architecture
//!
//! ```text
//! caller ──start()──► AsyncComponent ──tokio::spawn──► worker task
//!    │                     │                              │
//!    │  pause/resume/      │ ProcessControl (shared)      │
//!    ├──cancel──────────►  ├────────────────────────────► │ observed at
//!    │                     │                              │ suspension points
//!    │  state/progress/    │ ProcessMonitor (shared)      │
//!    └──listeners ◄──────  └◄──────────────────────────── │ transitions
//! ```
//!
//! # Control Semantics
//!
//! - Pause/resume/cancel forward through the shared control; a request
//!   recorded before the worker picks the job up is honored at pickup.
//! - Cancel of an already rolling-back or failed component is an
//!   observable no-op (idempotent).
//! - Cancel after `Succeeded` reclaims the component from the worker
//!   and runs a compensating undo.

use crate::monitor::ProcessMonitor;
use crate::{
    ContextSlot, ProcessComponent, ProcessControl, ProcessError, ProcessListener, ProcessState,
    RollbackReason,
};
use parking_lot::Mutex;
use std::sync::Arc;
use syncmesh_types::ProcessId;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs a process component on a worker task, keeping a live handle.
pub struct AsyncComponent {
    id: ProcessId,
    monitor: Arc<ProcessMonitor>,
    control: Arc<ProcessControl>,
    /// Present until `start` hands the component to the worker, and
    /// again after a compensating undo reclaims it.
    component: Mutex<Option<ProcessComponent>>,
    task: Mutex<Option<JoinHandle<ProcessComponent>>>,
}

impl AsyncComponent {
    /// Wraps a component. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(component: ProcessComponent) -> Self {
        Self {
            id: component.id(),
            monitor: Arc::clone(component.monitor()),
            control: ProcessControl::new(),
            component: Mutex::new(Some(component)),
            task: Mutex::new(None),
        }
    }

    /// Submits the component to a worker task and returns immediately.
    ///
    /// The outcome is observable through [`state`](Self::state),
    /// [`join`](Self::join) and attached listeners.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidState`] if already started.
    pub fn start(&self) -> Result<(), ProcessError> {
        let Some(mut component) = self.component.lock().take() else {
            return Err(ProcessError::InvalidState {
                operation: "start",
                state: self.monitor.state(),
            });
        };

        debug!("submitting '{}' to worker", component.name());
        let control = Arc::clone(&self.control);
        let handle = tokio::spawn(async move {
            // The terminal state and failure reason are published via
            // the shared monitor; the component itself travels back for
            // a potential compensating undo.
            let _ = component.start_with_control(&control).await;
            component
        });
        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Stable identity of the wrapped component.
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Display name of the wrapped component.
    #[must_use]
    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    /// Live state of the wrapped component.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.monitor.state()
    }

    /// Live progress of the wrapped component.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.monitor.progress()
    }

    /// The failure reason, once the component failed.
    #[must_use]
    pub fn failure(&self) -> Option<RollbackReason> {
        self.monitor.failure()
    }

    /// Attaches a terminal-event listener (live while running).
    pub fn attach_listener(&self, listener: Arc<dyn ProcessListener>) {
        self.monitor.attach_listener(listener);
    }

    /// Detaches a listener by identity.
    pub fn detach_listener(&self, listener: &Arc<dyn ProcessListener>) {
        self.monitor.detach_listener(listener);
    }

    /// Requests a pause.
    ///
    /// Honored cooperatively at the tree's next suspension point; a
    /// request recorded before pickup is honored at pickup.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidState`] if the component is paused or
    /// terminal.
    pub fn pause(&self) -> Result<(), ProcessError> {
        match self.monitor.state() {
            ProcessState::Ready | ProcessState::Running | ProcessState::Rollbacking => {
                self.control.request_pause();
                Ok(())
            }
            state => Err(ProcessError::InvalidState {
                operation: "pause",
                state,
            }),
        }
    }

    /// Resumes a paused component (forward or rollback, whichever was
    /// suspended).
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidState`] if no pause is in effect.
    pub fn resume(&self) -> Result<(), ProcessError> {
        if self.monitor.state() == ProcessState::Paused || self.control.pause_requested() {
            self.control.request_resume();
            Ok(())
        } else {
            Err(ProcessError::InvalidState {
                operation: "resume",
                state: self.monitor.state(),
            })
        }
    }

    /// Cancels the wrapped component.
    ///
    /// - Not yet picked up, running or paused: the request is recorded
    ///   and honored at the next suspension point; rollback follows.
    /// - Already rolling back or failed: observable no-op.
    /// - Succeeded: compensating undo - the component is reclaimed from
    ///   the worker and its succeeded steps roll back in reverse
    ///   completion order.
    ///
    /// # Errors
    ///
    /// [`ProcessError::WorkerLost`] if the worker task disappeared.
    pub async fn cancel(&self, reason: RollbackReason) -> Result<(), ProcessError> {
        match self.monitor.state() {
            ProcessState::Ready | ProcessState::Running | ProcessState::Paused => {
                self.control.request_cancel(reason);
                Ok(())
            }
            ProcessState::Rollbacking | ProcessState::Failed => Ok(()),
            ProcessState::Succeeded => {
                let handle = self.task.lock().take();
                let mut component = match handle {
                    Some(handle) => handle.await.map_err(|_| ProcessError::WorkerLost)?,
                    None => self
                        .component
                        .lock()
                        .take()
                        .ok_or(ProcessError::WorkerLost)?,
                };
                let result = component.cancel(reason).await;
                *self.component.lock() = Some(component);
                result
            }
        }
    }

    /// Waits for the component to reach a terminal state.
    pub async fn join(&self) -> ProcessState {
        self.monitor.wait_terminal().await
    }
}

impl std::fmt::Debug for AsyncComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncComponent")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// An [`AsyncComponent`] whose pipeline produces a typed result.
///
/// The wrapped pipeline writes the result into the shared slot before
/// it succeeds; retrieval is single-shot.
pub struct AsyncResultComponent<T> {
    inner: AsyncComponent,
    result: Arc<ContextSlot<T>>,
}

impl<T: Send + 'static> AsyncResultComponent<T> {
    /// Wraps a result-bearing component; `result` is the slot the
    /// pipeline fills.
    #[must_use]
    pub fn new(component: ProcessComponent, result: Arc<ContextSlot<T>>) -> Self {
        Self {
            inner: AsyncComponent::new(component),
            result,
        }
    }

    /// Submits the component to a worker task. See
    /// [`AsyncComponent::start`].
    pub fn start(&self) -> Result<(), ProcessError> {
        self.inner.start()
    }

    /// The plain handle (state, progress, listeners, control).
    #[must_use]
    pub fn handle(&self) -> &AsyncComponent {
        &self.inner
    }

    /// Blocks until terminal, then retrieves the result (single-shot).
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Failed`] carrying the rollback reason - and
    ///   through it the causal error - if the pipeline failed.
    /// - [`ProcessError::SlotEmpty`] if retrieved twice, or if the
    ///   pipeline succeeded without producing a result.
    pub async fn await_result(&self) -> Result<T, ProcessError> {
        match self.inner.join().await {
            ProcessState::Succeeded => self.result.take(),
            _ => Err(ProcessError::Failed(self.inner.failure().unwrap_or_else(
                || RollbackReason::new("process failed without a recorded reason"),
            ))),
        }
    }
}

impl<T> std::fmt::Debug for AsyncResultComponent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncResultComponent")
            .field("inner", &self.inner)
            .finish()
    }
}
