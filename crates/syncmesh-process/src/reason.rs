//! Rollback reasons.
//!
//! When a pipeline is cancelled or a step fails, the cause travels with
//! the rollback as a [`RollbackReason`]: an immutable record of a
//! human-readable hint, the causal error (if any), and the component
//! the failure originated from.

use std::sync::Arc;
use syncmesh_types::ProcessId;

/// Why a process component is rolling back.
///
/// Immutable once constructed. Cloning is cheap - the causal error is
/// reference-counted so the same reason can be delivered to every
/// listener along the unwind path.
///
/// # Example
///
/// ```
/// use syncmesh_process::RollbackReason;
///
/// let reason = RollbackReason::new("meta document put rejected");
/// assert_eq!(reason.hint(), "meta document put rejected");
/// assert!(reason.source().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RollbackReason {
    hint: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    origin: Option<ProcessId>,
}

impl RollbackReason {
    /// Creates a reason with just a hint.
    #[must_use]
    pub fn new(hint: impl Into<String>) -> Self {
        Self {
            hint: hint.into(),
            source: None,
            origin: None,
        }
    }

    /// Attaches the causal error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Attaches the component the failure originated from.
    #[must_use]
    pub fn with_origin(mut self, origin: ProcessId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Returns the human-readable hint.
    #[must_use]
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Returns the causal error, if recorded.
    #[must_use]
    pub fn source(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.source.as_deref()
    }

    /// Returns the id of the component the failure originated from.
    #[must_use]
    pub fn origin(&self) -> Option<ProcessId> {
        self.origin
    }
}

impl std::fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hint)
    }
}
