//! Terminal-event listeners.
//!
//! Listeners observe a single component's terminal events. Delivery is
//! at-most-once per terminal event, in attach order, and `on_finished`
//! always fires after `on_succeeded` or `on_failed`. A component does
//! not keep listeners alive beyond its own terminal state: the set is
//! released as part of the first terminal notification, so a later
//! compensating undo has nothing left to notify.
//!
//! Implementations must not block inside a notification; post to your
//! own queue or channel instead.
//!
//! # Example
//!
//! ```
//! use syncmesh_process::{ProcessListener, RollbackReason};
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! #[derive(Default)]
//! struct DoneFlag(AtomicBool);
//!
//! impl ProcessListener for DoneFlag {
//!     fn on_finished(&self) {
//!         self.0.store(true, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::RollbackReason;
use std::sync::Arc;
use tracing::debug;

/// Sink for a component's terminal events.
///
/// All methods default to no-ops; implement only what you observe.
///
/// # Delivery Contract
///
/// | Event | When | Order |
/// |-------|------|-------|
/// | `on_succeeded` | Component reached `Succeeded` | Before `on_finished` |
/// | `on_failed` | Component reached `Failed` | Before `on_finished` |
/// | `on_finished` | After either terminal event | Last |
///
/// Within one event, listeners are invoked in attach order. Detaching
/// during a notification takes effect for subsequent events only.
pub trait ProcessListener: Send + Sync {
    /// Component reached `Succeeded`.
    fn on_succeeded(&self) {}

    /// Component reached `Failed`.
    fn on_failed(&self, _reason: &RollbackReason) {}

    /// Component reached a terminal state (fires after the specific
    /// event).
    fn on_finished(&self) {}
}

/// Ordered set of listeners attached to one component.
///
/// Not shared directly - it lives inside the component's monitor and is
/// consumed by the first terminal notification.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<Arc<dyn ProcessListener>>,
}

impl ListenerSet {
    pub(crate) fn attach(&mut self, listener: Arc<dyn ProcessListener>) {
        self.entries.push(listener);
    }

    /// Removes a listener by identity. No effect if not attached.
    pub(crate) fn detach(&mut self, listener: &Arc<dyn ProcessListener>) {
        self.entries.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Delivers the succeeded event, then finished, consuming the set.
    pub(crate) fn notify_succeeded(self, component: &str) {
        debug!("'{}' notifying {} listener(s): succeeded", component, self.entries.len());
        for listener in &self.entries {
            listener.on_succeeded();
        }
        for listener in &self.entries {
            listener.on_finished();
        }
    }

    /// Delivers the failed event, then finished, consuming the set.
    pub(crate) fn notify_failed(self, component: &str, reason: &RollbackReason) {
        debug!("'{}' notifying {} listener(s): failed", component, self.entries.len());
        for listener in &self.entries {
            listener.on_failed(reason);
        }
        for listener in &self.entries {
            listener.on_finished();
        }
    }
}
