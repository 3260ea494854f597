//! Test doubles for the process framework.
//!
//! Mock steps and listeners that record what happened to a shared log,
//! used by this crate's tests and by downstream crates exercising
//! pipeline behavior.
//!
//! # Example
//!
//! ```
//! use syncmesh_process::testing::RecordingStep;
//! use syncmesh_process::ProcessComponent;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let mut pipeline = ProcessComponent::sequential("demo");
//! pipeline.add_step("a", RecordingStep::ok("a", &log)).unwrap();
//! pipeline.start().await.unwrap();
//! assert_eq!(*log.lock(), vec!["execute:a"]);
//! # }
//! ```

use crate::{ProcessError, ProcessListener, ProcessStep, RollbackReason, StepEnv};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Shared event log used by the mocks.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// A step that records `execute:<label>` and `rollback:<label>`, and
/// optionally fails its execution.
pub struct RecordingStep {
    label: String,
    log: EventLog,
    fail: bool,
}

impl RecordingStep {
    /// A step that succeeds.
    #[must_use]
    pub fn ok(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            label: label.into(),
            log: Arc::clone(log),
            fail: false,
        }
    }

    /// A step that fails its execution with `"<label> failed"`.
    #[must_use]
    pub fn failing(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            label: label.into(),
            log: Arc::clone(log),
            fail: true,
        }
    }
}

#[async_trait]
impl ProcessStep for RecordingStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        self.log.lock().push(format!("execute:{}", self.label));
        if self.fail {
            return Err(ProcessError::execution(format!("{} failed", self.label)));
        }
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        self.log.lock().push(format!("rollback:{}", self.label));
        Ok(())
    }
}

/// A step that appends follow-on [`RecordingStep`]s to its composite.
pub struct ExtendingStep {
    label: String,
    log: EventLog,
    extensions: Vec<String>,
}

impl ExtendingStep {
    /// Creates a step that appends one recording step per label in
    /// `extensions`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &EventLog, extensions: &[&str]) -> Self {
        Self {
            label: label.into(),
            log: Arc::clone(log),
            extensions: extensions.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

#[async_trait]
impl ProcessStep for ExtendingStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        self.log.lock().push(format!("execute:{}", self.label));
        for label in self.extensions.drain(..) {
            let step = RecordingStep::ok(label.clone(), &self.log);
            env.extend_step(label, step);
        }
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        self.log.lock().push(format!("rollback:{}", self.label));
        Ok(())
    }
}

/// A step that works in checkpointed 5ms slices.
///
/// Records `begin:<label>` when it starts, `execute:<label>` only if it
/// ran to completion, and `rollback:<label>` when compensated. Useful
/// for cancel/abort tests: the step observes interruption at its next
/// slice boundary.
pub struct SlowStep {
    label: String,
    log: EventLog,
    millis: u64,
    fail: bool,
}

impl SlowStep {
    /// A slow step that eventually succeeds.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &EventLog, millis: u64) -> Self {
        Self {
            label: label.into(),
            log: Arc::clone(log),
            millis,
            fail: false,
        }
    }

    /// A slow step that eventually fails.
    #[must_use]
    pub fn failing(label: impl Into<String>, log: &EventLog, millis: u64) -> Self {
        Self {
            label: label.into(),
            log: Arc::clone(log),
            millis,
            fail: true,
        }
    }
}

#[async_trait]
impl ProcessStep for SlowStep {
    async fn execute(&mut self, env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
        env.checkpoint().await?;
        self.log.lock().push(format!("begin:{}", self.label));

        let mut remaining = self.millis;
        while remaining > 0 {
            let slice = remaining.min(5);
            tokio::time::sleep(Duration::from_millis(slice)).await;
            remaining -= slice;
            env.checkpoint().await?;
        }

        self.log.lock().push(format!("execute:{}", self.label));
        if self.fail {
            return Err(ProcessError::execution(format!("{} failed", self.label)));
        }
        Ok(())
    }

    async fn rollback(&mut self, _reason: &RollbackReason) -> Result<(), ProcessError> {
        self.log.lock().push(format!("rollback:{}", self.label));
        Ok(())
    }
}

/// A listener recording `"<tag>:succeeded"`, `"<tag>:failed"` and
/// `"<tag>:finished"`.
pub struct RecordingListener {
    tag: String,
    log: EventLog,
}

impl RecordingListener {
    /// Creates a listener writing to the shared log.
    #[must_use]
    pub fn new(tag: impl Into<String>, log: &EventLog) -> Self {
        Self {
            tag: tag.into(),
            log: Arc::clone(log),
        }
    }
}

impl ProcessListener for RecordingListener {
    fn on_succeeded(&self) {
        self.log.lock().push(format!("{}:succeeded", self.tag));
    }

    fn on_failed(&self, _reason: &RollbackReason) {
        self.log.lock().push(format!("{}:failed", self.tag));
    }

    fn on_finished(&self) {
        self.log.lock().push(format!("{}:finished", self.tag));
    }
}
