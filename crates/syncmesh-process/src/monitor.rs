//! Shared observation cell for a process component.
//!
//! A component's state, progress, listeners and failure outcome live in
//! a [`ProcessMonitor`] shared between the component (which owns the
//! transitions) and any handle observing it from another task - most
//! importantly the async wrapper, which must report live state and
//! accept listener attachment while the component runs on a worker.
//!
//! The monitor is the single transition choke point: every state change
//! in the framework goes through [`ProcessMonitor::transition`], which
//! rejects illegal edges.

use crate::listener::ListenerSet;
use crate::{ProcessError, ProcessListener, ProcessState, RollbackReason};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Live state, progress and listeners of one component.
pub struct ProcessMonitor {
    name: String,
    state: Mutex<ProcessState>,
    progress: Mutex<f64>,
    /// `Some` until the first terminal notification consumes the set.
    listeners: Mutex<Option<ListenerSet>>,
    /// Reason recorded when the component fails.
    outcome: Mutex<Option<RollbackReason>>,
    /// Woken on every transition into a terminal state.
    done: Notify,
}

impl ProcessMonitor {
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(ProcessState::Ready),
            progress: Mutex::new(0.0),
            listeners: Mutex::new(Some(ListenerSet::default())),
            outcome: Mutex::new(None),
            done: Notify::new(),
        })
    }

    /// Component display name (for logging).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    /// Current progress in `[0.0, 1.0]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        *self.progress.lock()
    }

    pub(crate) fn set_progress(&self, progress: f64) {
        *self.progress.lock() = progress.clamp(0.0, 1.0);
    }

    /// Performs a checked state transition.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidState`] if the edge is illegal.
    pub(crate) fn transition(&self, to: ProcessState) -> Result<(), ProcessError> {
        let mut state = self.state.lock();
        if !state.can_transition(to) {
            return Err(ProcessError::InvalidState {
                operation: "transition",
                state: *state,
            });
        }
        debug!("'{}': {} -> {}", self.name, *state, to);
        *state = to;
        drop(state);

        if to.is_terminal() {
            self.done.notify_waiters();
        }
        Ok(())
    }

    /// Attaches a listener.
    ///
    /// Attaching to a component that already reached a terminal state
    /// has no effect - terminal events have already been delivered.
    pub fn attach_listener(&self, listener: Arc<dyn ProcessListener>) {
        let mut guard = self.listeners.lock();
        match guard.as_mut() {
            Some(set) => set.attach(listener),
            None => debug!("'{}': listener attached after terminal state, dropping", self.name),
        }
    }

    /// Detaches a listener by identity.
    pub fn detach_listener(&self, listener: &Arc<dyn ProcessListener>) {
        if let Some(set) = self.listeners.lock().as_mut() {
            set.detach(listener);
        }
    }

    /// Returns the failure reason, if the component failed.
    #[must_use]
    pub fn failure(&self) -> Option<RollbackReason> {
        self.outcome.lock().clone()
    }

    /// Delivers the succeeded terminal event and releases the listeners.
    pub(crate) fn notify_succeeded(&self) {
        if let Some(set) = self.listeners.lock().take() {
            set.notify_succeeded(&self.name);
        }
    }

    /// Records the failure reason, delivers the failed terminal event
    /// and releases the listeners.
    ///
    /// A component that already notified success (and is now being
    /// compensated) has no listeners left - nothing re-fires.
    pub(crate) fn notify_failed(&self, reason: &RollbackReason) {
        self.outcome.lock().get_or_insert_with(|| reason.clone());
        if let Some(set) = self.listeners.lock().take() {
            set.notify_failed(&self.name, reason);
        }
    }

    /// Waits until the component reaches a terminal state.
    pub async fn wait_terminal(&self) -> ProcessState {
        loop {
            let notified = self.done.notified();
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ProcessMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMonitor")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}
