//! Process components: the unit every pipeline is built from.
//!
//! A [`ProcessComponent`] is either a leaf step or a composite of
//! ordered children - one concrete type carrying the state machine,
//! identity, progress and listeners, with the body supplying the work.
//! Deep template-method hierarchies are replaced by this single value
//! plus the [`ProcessStep`] hook trait.
//!
//! # Ownership
//!
//! A composite owns its children exclusively. There is no parent
//! back-edge: a child's failure propagates outward as a returned
//! reason, and the outermost component drives the unwind downward -
//! which is exactly the parent-first cancel ordering, without an
//! ownership cycle.
//!
//! # Driving
//!
//! ```text
//! start ──► run_forward ──ok──► Succeeded (notify)
//!                 │
//!                 └─err(reason)──► run_rollback ──► Failed (notify)
//!                                  (reverse completion order)
//! ```
//!
//! `start` runs the component to a terminal state. Wrap the component
//! in an [`AsyncComponent`](crate::AsyncComponent) to run it on a
//! worker and keep a live handle.
//!
//! # Example
//!
//! ```
//! use syncmesh_process::{ProcessComponent, ProcessError, ProcessStep, StepEnv, ProcessState};
//! use async_trait::async_trait;
//!
//! struct Nop;
//!
//! #[async_trait]
//! impl ProcessStep for Nop {
//!     async fn execute(&mut self, _env: &mut StepEnv<'_>) -> Result<(), ProcessError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ProcessError> {
//! let mut pipeline = ProcessComponent::sequential("demo");
//! pipeline.add_step("nop", Nop)?;
//! pipeline.start().await?;
//! assert_eq!(pipeline.state(), ProcessState::Succeeded);
//! # Ok(())
//! # }
//! ```

use crate::composite::{Composite, ExecutionPolicy};
use crate::monitor::ProcessMonitor;
use crate::{
    ProcessControl, ProcessError, ProcessListener, ProcessState, ProcessStep, RollbackReason,
    StepEnv,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use syncmesh_types::ProcessId;
use tracing::{debug, info, warn};

type ForwardFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RollbackReason>> + Send + 'a>>;
type UnwindFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProcessError>> + Send + 'a>>;

enum Body {
    Step(Box<dyn ProcessStep>),
    Composite(Composite),
}

/// A leaf step or composite with identity, state, progress and
/// listeners.
///
/// Equality is by identity: the [`ProcessId`] assigned at construction
/// and stable across every state transition.
pub struct ProcessComponent {
    id: ProcessId,
    monitor: Arc<ProcessMonitor>,
    body: Body,
}

impl ProcessComponent {
    /// Creates a leaf component from a step.
    #[must_use]
    pub fn step(name: impl Into<String>, step: impl ProcessStep + 'static) -> Self {
        Self {
            id: ProcessId::new(),
            monitor: ProcessMonitor::new(name),
            body: Body::Step(Box::new(step)),
        }
    }

    /// Creates an empty sequential composite.
    #[must_use]
    pub fn sequential(name: impl Into<String>) -> Self {
        Self::composite(name, ExecutionPolicy::Sequential)
    }

    /// Creates an empty concurrent composite.
    #[must_use]
    pub fn concurrent(name: impl Into<String>) -> Self {
        Self::composite(name, ExecutionPolicy::Concurrent)
    }

    fn composite(name: impl Into<String>, policy: ExecutionPolicy) -> Self {
        Self {
            id: ProcessId::new(),
            monitor: ProcessMonitor::new(name),
            body: Body::Composite(Composite::new(policy)),
        }
    }

    /// Appends a child while building the composite.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidState`] if the component has already been
    /// started, or is a leaf. Runtime extension goes through
    /// [`StepEnv::extend`] instead.
    pub fn add(&mut self, child: ProcessComponent) -> Result<(), ProcessError> {
        if !self.state().is_ready() {
            return Err(ProcessError::InvalidState {
                operation: "add",
                state: self.state(),
            });
        }
        match &mut self.body {
            Body::Composite(composite) => {
                composite.push(child);
                Ok(())
            }
            Body::Step(_) => Err(ProcessError::InvalidState {
                operation: "add",
                state: self.state(),
            }),
        }
    }

    /// Convenience: appends a named leaf step.
    pub fn add_step(
        &mut self,
        name: impl Into<String>,
        step: impl ProcessStep + 'static,
    ) -> Result<(), ProcessError> {
        self.add(Self::step(name, step))
    }

    /// Stable identity.
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.monitor.state()
    }

    /// Current progress in `[0.0, 1.0]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.monitor.progress()
    }

    /// The execution policy, for composites.
    #[must_use]
    pub fn policy(&self) -> Option<ExecutionPolicy> {
        match &self.body {
            Body::Composite(composite) => Some(composite.policy()),
            Body::Step(_) => None,
        }
    }

    /// Children of a composite (empty slice for a leaf).
    #[must_use]
    pub fn children(&self) -> &[ProcessComponent] {
        match &self.body {
            Body::Composite(composite) => composite.children(),
            Body::Step(_) => &[],
        }
    }

    /// Shared observation cell (live state, progress, listeners).
    #[must_use]
    pub fn monitor(&self) -> &Arc<ProcessMonitor> {
        &self.monitor
    }

    /// Attaches a terminal-event listener.
    pub fn attach_listener(&self, listener: Arc<dyn ProcessListener>) {
        self.monitor.attach_listener(listener);
    }

    /// Detaches a listener by identity.
    pub fn detach_listener(&self, listener: &Arc<dyn ProcessListener>) {
        self.monitor.detach_listener(listener);
    }

    /// Runs the component to a terminal state.
    ///
    /// On a step failure the already-succeeded prefix is rolled back in
    /// reverse completion order before this returns.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::InvalidState`] if not `Ready`.
    /// - [`ProcessError::Failed`] with the rollback reason if the
    ///   pipeline failed.
    pub async fn start(&mut self) -> Result<(), ProcessError> {
        let control = ProcessControl::new();
        self.start_with_control(&control).await
    }

    /// Runs the component under an externally held control, through
    /// which pause/resume/cancel requests reach the running tree.
    pub async fn start_with_control(
        &mut self,
        control: &Arc<ProcessControl>,
    ) -> Result<(), ProcessError> {
        if !self.state().is_ready() {
            return Err(ProcessError::InvalidState {
                operation: "start",
                state: self.state(),
            });
        }

        let mut orphaned = Vec::new();
        let result = self.run_forward(control, &[], &mut orphaned).await;
        if !orphaned.is_empty() {
            warn!(
                "'{}': dropping {} extension step(s) - a root leaf has no enclosing composite",
                self.name(),
                orphaned.len()
            );
        }

        match result {
            Ok(()) => Ok(()),
            Err(reason) => {
                self.run_rollback(&reason, control).await?;
                Err(ProcessError::Failed(reason))
            }
        }
    }

    /// Compensating undo of a component that already succeeded.
    ///
    /// Rolls back every succeeded descendant in reverse completion
    /// order. Terminal events are not re-delivered - the listeners were
    /// released when the component first completed.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidState`] unless the component is
    /// `Succeeded`.
    pub async fn cancel(&mut self, reason: RollbackReason) -> Result<(), ProcessError> {
        match self.state() {
            ProcessState::Succeeded => {
                let control = ProcessControl::new();
                self.run_rollback(&reason, &control).await
            }
            state => Err(ProcessError::InvalidState {
                operation: "cancel",
                state,
            }),
        }
    }

    pub(crate) fn run_forward<'a>(
        &'a mut self,
        control: &'a Arc<ProcessControl>,
        scopes: &'a [Arc<AtomicBool>],
        appended: &'a mut Vec<ProcessComponent>,
    ) -> ForwardFuture<'a> {
        Box::pin(async move {
            let id = self.id;
            self.monitor
                .transition(ProcessState::Running)
                .map_err(|e| escalate(id, e))?;

            match &mut self.body {
                Body::Step(step) => {
                    debug!("executing step '{}'", self.monitor.name());

                    // Honor a cancel or pause recorded before pickup.
                    if let Some(reason) = control.cancel_requested() {
                        return abort_step(&self.monitor, id, step.as_mut(), reason).await;
                    }
                    if control.pause_requested() {
                        self.monitor
                            .transition(ProcessState::Paused)
                            .map_err(|e| escalate(id, e))?;
                        step.on_pause();
                        if let Some(reason) = control.wait_resume(scopes).await {
                            return abort_step(&self.monitor, id, step.as_mut(), reason).await;
                        }
                        self.monitor
                            .transition(ProcessState::Running)
                            .map_err(|e| escalate(id, e))?;
                        step.on_resume();
                    }

                    let mut env = StepEnv::new(
                        Arc::clone(&self.monitor),
                        Arc::clone(control),
                        scopes.to_vec(),
                        appended,
                    );
                    let result = step.execute(&mut env).await;
                    drop(env);

                    match result {
                        Ok(()) => {
                            self.monitor.set_progress(1.0);
                            self.monitor
                                .transition(ProcessState::Succeeded)
                                .map_err(|e| escalate(id, e))?;
                            self.monitor.notify_succeeded();
                            Ok(())
                        }
                        Err(err) if err.is_aborted() => {
                            let reason = control
                                .cancel_requested()
                                .unwrap_or_else(|| RollbackReason::new("aborted by sibling failure"));
                            abort_step(&self.monitor, id, step.as_mut(), reason).await
                        }
                        Err(err) => {
                            // Execution failure: the state passes through
                            // Rollbacking, but the rollback hook is not
                            // invoked - the step never succeeded.
                            let reason = RollbackReason::new(err.to_string())
                                .with_source(err)
                                .with_origin(id);
                            self.monitor
                                .transition(ProcessState::Rollbacking)
                                .map_err(|e| escalate(id, e))?;
                            self.monitor
                                .transition(ProcessState::Failed)
                                .map_err(|e| escalate(id, e))?;
                            self.monitor.notify_failed(&reason);
                            Err(reason)
                        }
                    }
                }
                Body::Composite(composite) => {
                    debug!(
                        "executing composite '{}' ({} children, {})",
                        self.monitor.name(),
                        composite.len(),
                        composite.policy()
                    );
                    composite.run_forward(&self.monitor, control, scopes).await?;
                    self.monitor.set_progress(1.0);
                    self.monitor
                        .transition(ProcessState::Succeeded)
                        .map_err(|e| escalate(id, e))?;
                    self.monitor.notify_succeeded();
                    Ok(())
                }
            }
        })
    }

    pub(crate) fn run_rollback<'a>(
        &'a mut self,
        reason: &'a RollbackReason,
        control: &'a Arc<ProcessControl>,
    ) -> UnwindFuture<'a> {
        Box::pin(async move {
            match self.state() {
                // Never started, or already terminal: nothing to undo.
                ProcessState::Ready | ProcessState::Failed | ProcessState::Rollbacking => {
                    return Ok(())
                }
                ProcessState::Running | ProcessState::Paused | ProcessState::Succeeded => {}
            }
            self.monitor.transition(ProcessState::Rollbacking)?;
            info!("rolling back '{}': {}", self.monitor.name(), reason.hint());

            match &mut self.body {
                Body::Step(step) => {
                    if control.pause_requested() {
                        self.monitor.transition(ProcessState::Paused)?;
                        step.on_pause();
                        control.wait_resume_rollback().await;
                        self.monitor.transition(ProcessState::Rollbacking)?;
                        step.on_resume_rollback();
                    }
                    if let Err(err) = step.rollback(reason).await {
                        warn!(
                            "'{}': rollback failed: {} (original failure: {})",
                            self.monitor.name(),
                            err,
                            reason.hint()
                        );
                    }
                }
                Body::Composite(composite) => {
                    composite.run_rollback(&self.monitor, reason, control).await?;
                }
            }

            self.monitor.transition(ProcessState::Failed)?;
            self.monitor.notify_failed(reason);
            Ok(())
        })
    }
}

impl PartialEq for ProcessComponent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProcessComponent {}

impl std::fmt::Debug for ProcessComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessComponent")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Cancel-induced abort of a running (or paused) step: the rollback
/// hook runs, since partial effects may exist.
async fn abort_step(
    monitor: &Arc<ProcessMonitor>,
    id: ProcessId,
    step: &mut dyn ProcessStep,
    reason: RollbackReason,
) -> Result<(), RollbackReason> {
    monitor
        .transition(ProcessState::Rollbacking)
        .map_err(|e| escalate(id, e))?;
    info!(
        "rolling back step '{}' (cancelled): {}",
        monitor.name(),
        reason.hint()
    );
    if let Err(err) = step.rollback(&reason).await {
        warn!(
            "'{}': rollback failed: {} (original: {})",
            monitor.name(),
            err,
            reason.hint()
        );
    }
    monitor
        .transition(ProcessState::Failed)
        .map_err(|e| escalate(id, e))?;
    monitor.notify_failed(&reason);
    Err(reason)
}

/// Wraps a framework-internal error into a rollback reason.
fn escalate(id: ProcessId, err: ProcessError) -> RollbackReason {
    RollbackReason::new(err.to_string())
        .with_source(err)
        .with_origin(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ExtendingStep, RecordingListener, RecordingStep, SlowStep};
    use parking_lot::Mutex;

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().clone()
    }

    #[tokio::test]
    async fn sequential_runs_in_insertion_order() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.add_step("s2", RecordingStep::ok("s2", &log)).unwrap();
        pipeline.add_step("s3", RecordingStep::ok("s3", &log)).unwrap();

        pipeline.start().await.expect("pipeline succeeds");

        assert_eq!(pipeline.state(), ProcessState::Succeeded);
        assert_eq!(pipeline.progress(), 1.0);
        assert_eq!(entries(&log), vec!["execute:s1", "execute:s2", "execute:s3"]);
    }

    #[tokio::test]
    async fn failing_child_rolls_back_prefix_in_reverse_order() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.add_step("s2", RecordingStep::ok("s2", &log)).unwrap();
        pipeline.add_step("s3", RecordingStep::failing("s3", &log)).unwrap();

        let err = pipeline.start().await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(_)));
        assert_eq!(pipeline.state(), ProcessState::Failed);
        // s3 executed and failed; its rollback hook is NOT invoked (it
        // never succeeded). s2 then s1 are compensated, strictly in
        // reverse completion order.
        assert_eq!(
            entries(&log),
            vec![
                "execute:s1",
                "execute:s2",
                "execute:s3",
                "rollback:s2",
                "rollback:s1"
            ]
        );
    }

    #[tokio::test]
    async fn failure_reason_carries_origin_and_source() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("bad", RecordingStep::failing("bad", &log)).unwrap();

        let err = pipeline.start().await.unwrap_err();
        let ProcessError::Failed(reason) = err else {
            panic!("expected Failed");
        };
        assert!(reason.hint().contains("bad failed"));
        assert!(reason.source().is_some());
        assert!(reason.origin().is_some());
    }

    #[tokio::test]
    async fn not_started_children_are_skipped() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::failing("s1", &log)).unwrap();
        pipeline.add_step("s2", RecordingStep::ok("s2", &log)).unwrap();

        pipeline.start().await.unwrap_err();

        // s2 never ran, never rolled back, and had no state transition.
        assert_eq!(entries(&log), vec!["execute:s1"]);
        assert_eq!(pipeline.children()[1].state(), ProcessState::Ready);
    }

    #[tokio::test]
    async fn nested_composites_unwind_globally_in_reverse() {
        let log = log();
        let mut inner = ProcessComponent::sequential("inner");
        inner.add_step("i1", RecordingStep::ok("i1", &log)).unwrap();
        inner.add_step("i2", RecordingStep::failing("i2", &log)).unwrap();

        let mut outer = ProcessComponent::sequential("outer");
        outer.add_step("o1", RecordingStep::ok("o1", &log)).unwrap();
        outer.add(inner).unwrap();

        outer.start().await.unwrap_err();

        assert_eq!(outer.state(), ProcessState::Failed);
        // The failing inner composite unwinds first (its own succeeded
        // prefix i1), then the outer prefix o1.
        assert_eq!(
            entries(&log),
            vec!["execute:o1", "execute:i1", "execute:i2", "rollback:i1", "rollback:o1"]
        );
    }

    #[tokio::test]
    async fn dynamic_extension_appends_and_runs() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline
            .add_step("find", ExtendingStep::new("find", &log, &["create-folder"]))
            .unwrap();

        pipeline.start().await.expect("pipeline succeeds");

        assert_eq!(entries(&log), vec!["execute:find", "execute:create-folder"]);
        assert_eq!(pipeline.children().len(), 2);
    }

    #[tokio::test]
    async fn appended_steps_skip_when_failure_precedes_them() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline
            .add_step("find", ExtendingStep::new("find", &log, &["get-meta"]))
            .unwrap();
        pipeline.add_step("tail", RecordingStep::failing("tail", &log)).unwrap();

        pipeline.start().await.unwrap_err();

        // Appended steps land at the end of the pipeline, so "tail"
        // runs (and fails) before the appended "get-meta" ever starts;
        // only the succeeded prefix compensates.
        assert_eq!(
            entries(&log),
            vec!["execute:find", "execute:tail", "rollback:find"]
        );
    }

    #[tokio::test]
    async fn add_after_start_is_invalid() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.start().await.unwrap();

        let err = pipeline
            .add_step("late", RecordingStep::ok("late", &log))
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidState { operation: "add", .. }));
    }

    #[tokio::test]
    async fn start_twice_is_invalid() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.start().await.unwrap();

        let err = pipeline.start().await.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::InvalidState { operation: "start", state: ProcessState::Succeeded }
        ));
    }

    #[tokio::test]
    async fn listeners_fire_once_finished_last() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();

        let events = log;
        pipeline.attach_listener(Arc::new(RecordingListener::new("l", &events)));
        pipeline.start().await.unwrap();

        let recorded = entries(&events);
        assert_eq!(
            recorded,
            vec!["execute:s1", "l:succeeded", "l:finished"]
        );
    }

    #[tokio::test]
    async fn failed_pipeline_notifies_failed_then_finished() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("bad", RecordingStep::failing("bad", &log)).unwrap();
        pipeline.attach_listener(Arc::new(RecordingListener::new("l", &log)));

        pipeline.start().await.unwrap_err();

        let recorded = entries(&log);
        assert_eq!(recorded[recorded.len() - 2..], ["l:failed", "l:finished"]);
    }

    #[tokio::test]
    async fn cancel_after_success_compensates_without_renotifying() {
        let log = log();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.add_step("s2", RecordingStep::ok("s2", &log)).unwrap();
        pipeline.attach_listener(Arc::new(RecordingListener::new("l", &log)));

        pipeline.start().await.unwrap();
        pipeline
            .cancel(RollbackReason::new("compensating undo"))
            .await
            .expect("undo succeeds");

        assert_eq!(pipeline.state(), ProcessState::Failed);
        assert_eq!(
            entries(&log),
            vec![
                "execute:s1",
                "execute:s2",
                "l:succeeded",
                "l:finished",
                // undo in reverse completion order; no second
                // terminal notification
                "rollback:s2",
                "rollback:s1",
            ]
        );
    }

    #[tokio::test]
    async fn cancel_in_ready_state_is_invalid() {
        let mut pipeline = ProcessComponent::sequential("pipeline");
        let err = pipeline.cancel(RollbackReason::new("nope")).await.unwrap_err();
        assert!(matches!(err, ProcessError::InvalidState { operation: "cancel", .. }));
    }

    #[tokio::test]
    async fn cancel_requested_through_control_aborts_between_children() {
        let log = log();
        let control = ProcessControl::new();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.add_step("s2", RecordingStep::ok("s2", &log)).unwrap();

        // Recorded before pickup: honored before the first child runs.
        control.request_cancel(RollbackReason::new("stop"));
        let err = pipeline.start_with_control(&control).await.unwrap_err();

        let ProcessError::Failed(reason) = err else {
            panic!("expected Failed");
        };
        assert_eq!(reason.hint(), "stop");
        assert_eq!(entries(&log), Vec::<String>::new());
        assert_eq!(pipeline.state(), ProcessState::Failed);
    }

    #[tokio::test]
    async fn cancelled_running_step_gets_its_rollback_hook() {
        let log = log();
        let control = ProcessControl::new();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline
            .add_step("slow", SlowStep::new("slow", &log, 50))
            .unwrap();

        let handle = {
            let control = Arc::clone(&control);
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                // Let s1 finish and "slow" get going, then cancel.
                while !log.lock().iter().any(|e| e == "begin:slow") {
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                }
                control.request_cancel(RollbackReason::new("user cancel"));
            })
        };

        let err = pipeline.start_with_control(&control).await.unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, ProcessError::Failed(_)));
        let recorded = entries(&log);
        // The interrupted step compensates its partial work, then the
        // succeeded prefix unwinds.
        assert_eq!(
            recorded,
            vec!["execute:s1", "begin:slow", "rollback:slow", "rollback:s1"]
        );
    }

    #[tokio::test]
    async fn pause_between_children_defers_next_child() {
        let log = log();
        let control = ProcessControl::new();
        let mut pipeline = ProcessComponent::sequential("pipeline");
        pipeline.add_step("s1", RecordingStep::ok("s1", &log)).unwrap();
        pipeline.add_step("s2", RecordingStep::ok("s2", &log)).unwrap();

        control.request_pause();
        let monitor = Arc::clone(pipeline.monitor());

        let resumer = {
            let control = Arc::clone(&control);
            tokio::spawn(async move {
                // Wait until the composite actually parks.
                while monitor.state() != ProcessState::Paused {
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                }
                control.request_resume();
            })
        };

        pipeline.start_with_control(&control).await.expect("succeeds after resume");
        resumer.await.unwrap();

        assert_eq!(pipeline.state(), ProcessState::Succeeded);
        assert_eq!(entries(&log), vec!["execute:s1", "execute:s2"]);
    }

    #[tokio::test]
    async fn concurrent_composite_runs_all_children() {
        let log = log();
        let mut batch = ProcessComponent::concurrent("batch");
        batch.add_step("a", RecordingStep::ok("a", &log)).unwrap();
        batch.add_step("b", RecordingStep::ok("b", &log)).unwrap();
        batch.add_step("c", RecordingStep::ok("c", &log)).unwrap();

        batch.start().await.expect("batch succeeds");

        let mut recorded = entries(&log);
        recorded.sort();
        assert_eq!(recorded, vec!["execute:a", "execute:b", "execute:c"]);
        assert_eq!(batch.state(), ProcessState::Succeeded);
    }

    #[tokio::test]
    async fn concurrent_first_failure_aborts_inflight_siblings() {
        let log = log();
        let mut batch = ProcessComponent::concurrent("batch");
        batch.add_step("fast-fail", RecordingStep::failing("fast-fail", &log)).unwrap();
        batch.add_step("slow", SlowStep::new("slow", &log, 200)).unwrap();

        let err = batch.start().await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(_)));
        assert_eq!(batch.state(), ProcessState::Failed);
        let recorded = entries(&log);
        // The slow sibling observed the abort scope at a checkpoint and
        // compensated instead of finishing.
        assert!(recorded.contains(&"rollback:slow".to_string()) || !recorded.contains(&"execute:slow".to_string()));
        assert!(!recorded.contains(&"rollback:fast-fail".to_string()));
    }

    #[tokio::test]
    async fn concurrent_completed_siblings_roll_back() {
        let log = log();
        let mut batch = ProcessComponent::concurrent("batch");
        batch.add_step("quick", RecordingStep::ok("quick", &log)).unwrap();
        batch
            .add_step("late-fail", SlowStep::failing("late-fail", &log, 30))
            .unwrap();

        batch.start().await.unwrap_err();

        let recorded = entries(&log);
        assert!(recorded.contains(&"execute:quick".to_string()));
        assert!(recorded.contains(&"rollback:quick".to_string()));
    }

    #[tokio::test]
    async fn component_equality_is_by_identity() {
        let log = log();
        let a = ProcessComponent::step("same-name", RecordingStep::ok("x", &log));
        let b = ProcessComponent::step("same-name", RecordingStep::ok("x", &log));
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
