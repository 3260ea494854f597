//! Process framework errors.
//!
//! # Error Code Convention
//!
//! All process errors use the `PROCESS_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`InvalidState`](ProcessError::InvalidState) | `PROCESS_INVALID_STATE` | No |
//! | [`ExecutionFailed`](ProcessError::ExecutionFailed) | `PROCESS_EXECUTION_FAILED` | Yes |
//! | [`Aborted`](ProcessError::Aborted) | `PROCESS_ABORTED` | No |
//! | [`RollbackFailed`](ProcessError::RollbackFailed) | `PROCESS_ROLLBACK_FAILED` | No |
//! | [`SlotAlreadySet`](ProcessError::SlotAlreadySet) | `PROCESS_SLOT_ALREADY_SET` | No |
//! | [`SlotEmpty`](ProcessError::SlotEmpty) | `PROCESS_SLOT_EMPTY` | No |
//! | [`Failed`](ProcessError::Failed) | `PROCESS_FAILED` | No |
//! | [`WorkerLost`](ProcessError::WorkerLost) | `PROCESS_WORKER_LOST` | No |
//!
//! # Failure vs. invalid state
//!
//! Invalid-state errors are raised synchronously to whoever drives a
//! component through an illegal transition. Execution failures are
//! values returned from a step's `execute` hook; they never unwind by
//! panic - the state machine consumes them and drives the rollback.

use crate::{ProcessState, RollbackReason};
use syncmesh_types::ErrorCode;
use thiserror::Error;

/// Process framework error.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// An operation was attempted in a state that does not allow it.
    ///
    /// Raised synchronously to the caller of start/pause/resume/cancel,
    /// and by the internal transition choke point if a bug would drive
    /// the machine through an illegal edge.
    ///
    /// **Not recoverable** - the call sequence is wrong.
    #[error("invalid state '{state}' for operation '{operation}'")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the component was in.
        state: ProcessState,
    },

    /// A step's execution failed.
    ///
    /// Triggers rollback of the enclosing pipeline.
    ///
    /// **Recoverable** - the operation may be retried from scratch.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Execution was interrupted by a cancel request.
    ///
    /// Returned from a checkpoint when a cancel (or a sibling failure in
    /// a concurrent composite) was observed. The interrupted step's
    /// rollback hook runs, since partial effects may exist.
    ///
    /// **Not recoverable** - intentional stop.
    #[error("execution aborted")]
    Aborted,

    /// A rollback hook itself failed.
    ///
    /// The component still reaches `Failed`; the original and the
    /// rollback error are both recorded in the logs. No automatic retry.
    ///
    /// **Not recoverable**.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    /// A context field was written twice during forward execution.
    ///
    /// Context fields fill monotonically: unset → set, exactly once.
    ///
    /// **Not recoverable** - pipeline wiring bug.
    #[error("context field '{0}' already set")]
    SlotAlreadySet(&'static str),

    /// A context field was read before any step produced it.
    ///
    /// **Not recoverable** - pipeline wiring bug.
    #[error("context field '{0}' not set")]
    SlotEmpty(&'static str),

    /// The process reached `Failed`.
    ///
    /// Carries the rollback reason, including the causal error when one
    /// was recorded. This is what result retrieval surfaces after a
    /// failed pipeline.
    ///
    /// **Not recoverable** through the same handle.
    #[error("process failed: {0}")]
    Failed(RollbackReason),

    /// The worker task executing the component disappeared.
    ///
    /// **Not recoverable**.
    #[error("worker task lost")]
    WorkerLost,
}

impl ProcessError {
    /// Shorthand for an execution failure with a formatted message.
    #[must_use]
    pub fn execution(message: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed(message.to_string())
    }

    /// Returns `true` if this error is a cancel-induced abort.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl ErrorCode for ProcessError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "PROCESS_INVALID_STATE",
            Self::ExecutionFailed(_) => "PROCESS_EXECUTION_FAILED",
            Self::Aborted => "PROCESS_ABORTED",
            Self::RollbackFailed(_) => "PROCESS_ROLLBACK_FAILED",
            Self::SlotAlreadySet(_) => "PROCESS_SLOT_ALREADY_SET",
            Self::SlotEmpty(_) => "PROCESS_SLOT_EMPTY",
            Self::Failed(_) => "PROCESS_FAILED",
            Self::WorkerLost => "PROCESS_WORKER_LOST",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_))
    }
}
