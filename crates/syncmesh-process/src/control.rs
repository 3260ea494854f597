//! Pause / resume / cancel control for a running process tree.
//!
//! A component executing on a worker cannot be borrowed by the caller,
//! so suspension and cancellation travel through a shared
//! [`ProcessControl`]: the handle records a request, and the running
//! tree observes it at its suspension points - between the children of
//! a sequential composite and at step checkpoints.
//!
//! Pause is advisory: a step that never checkpoints simply finishes its
//! unit of work before the pause takes effect. A request recorded
//! before the worker picks the job up is honored at pickup.
//!
//! Cancellation is first-wins: once a reason is recorded, later cancel
//! requests are no-ops.

use crate::RollbackReason;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Default)]
struct ControlState {
    pause_requested: bool,
    cancel: Option<RollbackReason>,
}

/// Shared control cell for one process tree.
///
/// Cloned (via `Arc`) into the async wrapper and threaded through the
/// execution of every component in the tree.
#[derive(Default)]
pub struct ProcessControl {
    inner: Mutex<ControlState>,
    changed: Notify,
}

impl ProcessControl {
    /// Creates a fresh control with no requests recorded.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a pause request.
    pub fn request_pause(&self) {
        self.inner.lock().pause_requested = true;
        self.changed.notify_waiters();
    }

    /// Clears a pause request, resuming the tree at its suspension
    /// point.
    pub fn request_resume(&self) {
        self.inner.lock().pause_requested = false;
        self.changed.notify_waiters();
    }

    /// Records a cancel request. The first recorded reason wins.
    ///
    /// Cancelling also clears a pending pause: a paused tree starts
    /// its rollback immediately. The rollback itself can be paused
    /// again.
    pub fn request_cancel(&self, reason: RollbackReason) {
        let mut inner = self.inner.lock();
        if inner.cancel.is_none() {
            debug!("cancel requested: {}", reason.hint());
            inner.cancel = Some(reason);
        }
        inner.pause_requested = false;
        drop(inner);
        self.changed.notify_waiters();
    }

    /// Returns `true` if a pause is currently requested.
    #[must_use]
    pub fn pause_requested(&self) -> bool {
        self.inner.lock().pause_requested
    }

    /// Returns the recorded cancel reason, if any.
    #[must_use]
    pub fn cancel_requested(&self) -> Option<RollbackReason> {
        self.inner.lock().cancel.clone()
    }

    /// Wakes all waiters without changing any request.
    ///
    /// Used by concurrent composites after flipping an abort scope, so
    /// that paused siblings re-check their surroundings.
    pub(crate) fn poke(&self) {
        self.changed.notify_waiters();
    }

    /// Waits while paused during rollback.
    ///
    /// Cancel requests are ignored here - the tree is already rolling
    /// back, and cancellation is idempotent once rollback has begun.
    pub(crate) async fn wait_resume_rollback(&self) {
        loop {
            let notified = self.changed.notified();
            if !self.inner.lock().pause_requested {
                return;
            }
            notified.await;
        }
    }

    /// Waits while paused.
    ///
    /// Returns `None` once resumed, or `Some(reason)` if a cancel (or
    /// an abort scope in `scopes`) interrupts the pause.
    pub(crate) async fn wait_resume(&self, scopes: &[Arc<AtomicBool>]) -> Option<RollbackReason> {
        loop {
            let notified = self.changed.notified();
            {
                let inner = self.inner.lock();
                if let Some(reason) = &inner.cancel {
                    return Some(reason.clone());
                }
                if scopes.iter().any(|s| s.load(Ordering::Acquire)) {
                    return Some(RollbackReason::new("aborted by sibling failure"));
                }
                if !inner.pause_requested {
                    return None;
                }
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ProcessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ProcessControl")
            .field("pause_requested", &inner.pause_requested)
            .field("cancelled", &inner.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_and_resume() {
        let control = ProcessControl::new();
        assert!(!control.pause_requested());

        control.request_pause();
        assert!(control.pause_requested());

        control.request_resume();
        assert!(!control.pause_requested());
    }

    #[test]
    fn first_cancel_wins() {
        let control = ProcessControl::new();
        control.request_cancel(RollbackReason::new("first"));
        control.request_cancel(RollbackReason::new("second"));

        let reason = control.cancel_requested().expect("cancelled");
        assert_eq!(reason.hint(), "first");
    }

    #[tokio::test]
    async fn wait_resume_returns_on_resume() {
        let control = ProcessControl::new();
        control.request_pause();

        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.wait_resume(&[]).await })
        };

        tokio::task::yield_now().await;
        control.request_resume();

        assert!(waiter.await.expect("join").is_none());
    }

    #[tokio::test]
    async fn wait_resume_returns_reason_on_cancel() {
        let control = ProcessControl::new();
        control.request_pause();

        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.wait_resume(&[]).await })
        };

        tokio::task::yield_now().await;
        control.request_cancel(RollbackReason::new("stop"));

        let reason = waiter.await.expect("join").expect("cancelled");
        assert_eq!(reason.hint(), "stop");
    }

    #[tokio::test]
    async fn wait_resume_observes_abort_scope() {
        let control = ProcessControl::new();
        control.request_pause();
        let scope = Arc::new(AtomicBool::new(false));

        let waiter = {
            let control = Arc::clone(&control);
            let scope = Arc::clone(&scope);
            tokio::spawn(async move { control.wait_resume(&[scope]).await })
        };

        tokio::task::yield_now().await;
        scope.store(true, Ordering::Release);
        control.poke();

        assert!(waiter.await.expect("join").is_some());
    }
}
