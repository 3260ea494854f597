//! Composite execution: ordered children under a policy.
//!
//! A composite holds an ordered sequence of child components and an
//! [`ExecutionPolicy`]. Sequential composites run children in insertion
//! order; concurrent composites run them in parallel on worker tasks.
//!
//! # Failure and Rollback
//!
//! A child's failure propagates to the outermost composite *before*
//! any compensation runs; the outermost then unwinds the
//! already-succeeded prefix in reverse completion order (stable
//! tie-break: insertion order). Under a concurrent policy the first
//! observed failure wins; in-flight siblings are aborted through a
//! per-composite scope flag they observe at their checkpoints.
//!
//! # Suspension
//!
//! Between two children of a sequential composite the composite checks
//! its control; if a pause was requested, no next child is started
//! until resume.

use crate::monitor::ProcessMonitor;
use crate::{ProcessComponent, ProcessControl, ProcessError, ProcessState, RollbackReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use syncmesh_types::ProcessId;
use tracing::{debug, info, warn};

/// How a composite runs its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Children run one at a time, in insertion order.
    Sequential,
    /// Children run in parallel on worker tasks.
    Concurrent,
}

impl std::fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Ordered children plus the bookkeeping the unwind needs.
pub(crate) struct Composite {
    policy: ExecutionPolicy,
    children: Vec<ProcessComponent>,
    /// Ids of children that completed successfully, in completion
    /// order. Rollback walks this in reverse.
    completed: Vec<ProcessId>,
}

impl Composite {
    pub(crate) fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            children: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub(crate) fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub(crate) fn push(&mut self, child: ProcessComponent) {
        self.children.push(child);
    }

    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn children(&self) -> &[ProcessComponent] {
        &self.children
    }

    pub(crate) async fn run_forward(
        &mut self,
        monitor: &Arc<ProcessMonitor>,
        control: &Arc<ProcessControl>,
        scopes: &[Arc<AtomicBool>],
    ) -> Result<(), RollbackReason> {
        match self.policy {
            ExecutionPolicy::Sequential => self.run_sequential(monitor, control, scopes).await,
            ExecutionPolicy::Concurrent => self.run_concurrent(monitor, control, scopes).await,
        }
    }

    async fn run_sequential(
        &mut self,
        monitor: &Arc<ProcessMonitor>,
        control: &Arc<ProcessControl>,
        scopes: &[Arc<AtomicBool>],
    ) -> Result<(), RollbackReason> {
        let mut cursor = 0;
        while cursor < self.children.len() {
            forward_gate(monitor, control, scopes).await?;

            let mut appended = Vec::new();
            let child = &mut self.children[cursor];
            let child_id = child.id();
            child.run_forward(control, scopes, &mut appended).await?;

            self.completed.push(child_id);
            if !appended.is_empty() {
                debug!(
                    "'{}': appending {} step(s) to the pipeline",
                    monitor.name(),
                    appended.len()
                );
                self.children.extend(appended);
            }
            cursor += 1;
            monitor.set_progress(self.completed.len() as f64 / self.children.len() as f64);
        }
        Ok(())
    }

    async fn run_concurrent(
        &mut self,
        monitor: &Arc<ProcessMonitor>,
        control: &Arc<ProcessControl>,
        scopes: &[Arc<AtomicBool>],
    ) -> Result<(), RollbackReason> {
        // Scope flag for this composite: flipped on first failure so
        // in-flight siblings abort at their next checkpoint.
        let scope = Arc::new(AtomicBool::new(false));
        let mut child_scopes = scopes.to_vec();
        child_scopes.push(Arc::clone(&scope));

        let mut slots: Vec<Option<ProcessComponent>> = self.children.drain(..).map(Some).collect();
        let mut first_failure: Option<RollbackReason> = None;

        loop {
            // Children appended dynamically by a finished wave start in
            // the next wave.
            let wave: Vec<usize> = slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.as_ref().is_some_and(|c| c.state().is_ready()))
                .map(|(i, _)| i)
                .collect();
            if wave.is_empty() || first_failure.is_some() {
                break;
            }

            if let Err(reason) = forward_gate(monitor, control, &child_scopes).await {
                first_failure = Some(reason);
                break;
            }

            let mut join = tokio::task::JoinSet::new();
            for idx in wave {
                if let Some(child) = slots[idx].take() {
                    let control = Arc::clone(control);
                    let scopes = child_scopes.clone();
                    join.spawn(async move {
                        let mut child = child;
                        let mut appended = Vec::new();
                        let result = child.run_forward(&control, &scopes, &mut appended).await;
                        (idx, child, result, appended)
                    });
                }
            }

            let mut extensions = Vec::new();
            while let Some(joined) = join.join_next().await {
                match joined {
                    Ok((idx, child, result, appended)) => {
                        let child_id = child.id();
                        slots[idx] = Some(child);
                        match result {
                            Ok(()) => {
                                self.completed.push(child_id);
                                extensions.extend(appended);
                            }
                            Err(reason) => {
                                if first_failure.is_none() {
                                    info!(
                                        "'{}': child failed, aborting in-flight siblings: {}",
                                        monitor.name(),
                                        reason.hint()
                                    );
                                    scope.store(true, Ordering::Release);
                                    control.poke();
                                    first_failure = Some(reason);
                                } else {
                                    warn!(
                                        "'{}': concurrent sibling failure suppressed: {}",
                                        monitor.name(),
                                        reason.hint()
                                    );
                                }
                            }
                        }
                    }
                    Err(err) => {
                        if first_failure.is_none() {
                            scope.store(true, Ordering::Release);
                            control.poke();
                            first_failure =
                                Some(RollbackReason::new(format!("worker task lost: {err}")));
                        }
                    }
                }
            }

            let total = slots.len() + extensions.len();
            monitor.set_progress(self.completed.len() as f64 / total.max(1) as f64);
            slots.extend(extensions.into_iter().map(Some));
        }

        // Reassemble in insertion order; lost tasks leave no child behind.
        self.children = slots.into_iter().flatten().collect();
        match first_failure {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    pub(crate) async fn run_rollback(
        &mut self,
        monitor: &Arc<ProcessMonitor>,
        reason: &RollbackReason,
        control: &Arc<ProcessControl>,
    ) -> Result<(), ProcessError> {
        // Children that never completed, newest first. This covers the
        // child whose failure started the unwind - a sub-composite may
        // still hold a succeeded prefix of its own. Never-started
        // children skip without a state transition.
        let completed = self.completed.clone();
        for child in self.children.iter_mut().rev() {
            if !completed.contains(&child.id()) {
                child.run_rollback(reason, control).await?;
            }
        }

        // Succeeded children in reverse completion order.
        for id in completed.iter().rev() {
            rollback_gate(monitor, control).await?;
            if let Some(child) = self.children.iter_mut().find(|c| c.id() == *id) {
                child.run_rollback(reason, control).await?;
            }
        }
        Ok(())
    }
}

/// Suspension point between children during forward execution.
///
/// Cancel (or an enclosing abort scope) wins over pause.
async fn forward_gate(
    monitor: &Arc<ProcessMonitor>,
    control: &Arc<ProcessControl>,
    scopes: &[Arc<AtomicBool>],
) -> Result<(), RollbackReason> {
    if let Some(reason) = control.cancel_requested() {
        return Err(reason);
    }
    if scopes.iter().any(|s| s.load(Ordering::Acquire)) {
        return Err(RollbackReason::new("aborted by sibling failure"));
    }
    if control.pause_requested() {
        monitor
            .transition(ProcessState::Paused)
            .map_err(|e| RollbackReason::new(e.to_string()).with_source(e))?;
        debug!("'{}' paused", monitor.name());
        if let Some(reason) = control.wait_resume(scopes).await {
            // State stays Paused; the unwind transitions it onward.
            return Err(reason);
        }
        monitor
            .transition(ProcessState::Running)
            .map_err(|e| RollbackReason::new(e.to_string()).with_source(e))?;
        debug!("'{}' resumed", monitor.name());
    }
    Ok(())
}

/// Suspension point between children during rollback.
async fn rollback_gate(
    monitor: &Arc<ProcessMonitor>,
    control: &Arc<ProcessControl>,
) -> Result<(), ProcessError> {
    if control.pause_requested() {
        monitor.transition(ProcessState::Paused)?;
        debug!("'{}' paused during rollback", monitor.name());
        control.wait_resume_rollback().await;
        monitor.transition(ProcessState::Rollbacking)?;
    }
    Ok(())
}
