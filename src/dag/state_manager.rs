// src/dag/state_manager.rs

//! Per-run state transitions for steps in the scheduler.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::action::{ActionTable, Resolution};
use crate::dag::step_info::{FinishedStep, RunState, ScheduledStep, StepInfo};
use crate::expr::{Evaluator, ExpressionContext, interpolate};
use crate::types::{OnError, SkipReason, StepStatus};

/// Read-only inputs needed to decide what an eligible step does.
pub struct StepResolver<'a> {
    pub stage: &'a str,
    pub actions: &'a ActionTable,
    pub context: &'a ExpressionContext,
    pub evaluator: &'a Evaluator,
}

/// Outcome of resolving a step whose requirements are all terminal.
#[derive(Debug)]
pub(crate) enum Eligibility {
    Run(ScheduledStep),
    Skip(SkipReason),
    /// Predicate, guard or interpolation failed to evaluate.
    Fail(String),
}

impl StepResolver<'_> {
    pub(crate) fn resolve(&self, info: &StepInfo) -> Eligibility {
        if let Some(condition) = &info.condition {
            match condition.evaluate(self.context, self.evaluator) {
                Ok(true) => {}
                Ok(false) => return Eligibility::Skip(SkipReason::ConditionNotMet),
                Err(e) => return Eligibility::Fail(format!("invalid condition: {e}")),
            }
        }

        let Some(action) = self.actions.get(&info.action) else {
            return Eligibility::Fail(format!("unknown action '{}'", info.action));
        };

        let runnable = match action.resolve(self.context, self.evaluator) {
            Ok(Resolution::Run(runnable)) => runnable,
            Ok(Resolution::NoMatchingVariant) => {
                return Eligibility::Skip(SkipReason::NoMatchingVariant);
            }
            Err(e) => {
                return Eligibility::Fail(format!(
                    "invalid variant guard in action '{}': {e}",
                    action.name
                ));
            }
        };

        let runnable = match runnable.interpolate(self.context, self.evaluator) {
            Ok(r) => r,
            Err(e) => return Eligibility::Fail(format!("interpolating command: {e}")),
        };

        let mut env = BTreeMap::new();
        for (key, template) in &action.env {
            match interpolate(template, self.context, self.evaluator) {
                Ok(value) => {
                    env.insert(key.clone(), value);
                }
                Err(e) => return Eligibility::Fail(format!("interpolating env '{key}': {e}")),
            }
        }

        Eligibility::Run(ScheduledStep {
            stage: self.stage.to_string(),
            index: info.index,
            name: info.name.clone(),
            action: info.action.clone(),
            runnable,
            env,
            on_error: info.on_error,
        })
    }
}

/// Where a step stands with respect to its requirements.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DepsState {
    /// At least one requirement is not terminal yet.
    Waiting,
    /// Every requirement is terminal and none blocks.
    Satisfied,
    /// A requirement failed (or was itself blocked); the step must be skipped.
    Blocked(SkipReason),
}

/// Manages per-run state transitions for steps.
pub struct StateManager<'a> {
    steps: &'a mut [StepInfo],
}

impl<'a> StateManager<'a> {
    pub fn new(steps: &'a mut [StepInfo]) -> Self {
        Self { steps }
    }

    /// Move a step to a terminal state.
    pub fn finish(
        &mut self,
        index: usize,
        status: StepStatus,
        skip: Option<SkipReason>,
        message: String,
    ) -> FinishedStep {
        let info = &mut self.steps[index];
        debug!(step = %info.name, %status, "step terminal");
        info.state = RunState::Done {
            status,
            skip: skip.clone(),
        };
        FinishedStep {
            index,
            name: info.name.clone(),
            status,
            skip_reason: skip,
            message,
        }
    }

    /// Resolve every pending step whose requirements are terminal.
    ///
    /// Repeats until nothing changes, so a failure cascades through the
    /// whole chain of dependents in one call. Steps that should run end up
    /// `Ready`; everything else becomes terminal and is returned.
    pub(crate) fn promote_eligible(&mut self, resolver: &StepResolver<'_>) -> Vec<FinishedStep> {
        let mut finished = Vec::new();

        loop {
            let mut changed = false;

            for index in 0..self.steps.len() {
                if self.steps[index].state != RunState::Pending {
                    continue;
                }

                let deps_state = ReadOnlyStateManager::new(self.steps).deps_state(index);
                match deps_state {
                    DepsState::Waiting => {}
                    DepsState::Blocked(reason) => {
                        info!(
                            stage = resolver.stage,
                            step = %self.steps[index].name,
                            reason = %reason,
                            "requirement did not succeed; skipping step"
                        );
                        let message = format!("skipped: {reason}");
                        finished.push(self.finish(
                            index,
                            StepStatus::Skipped,
                            Some(reason),
                            message,
                        ));
                        changed = true;
                    }
                    DepsState::Satisfied => {
                        match resolver.resolve(&self.steps[index]) {
                            Eligibility::Run(scheduled) => {
                                debug!(
                                    stage = resolver.stage,
                                    step = %scheduled.name,
                                    runnable = %scheduled.runnable,
                                    "requirements satisfied; step ready"
                                );
                                self.steps[index].state = RunState::Ready(Box::new(scheduled));
                            }
                            Eligibility::Skip(reason) => {
                                debug!(
                                    stage = resolver.stage,
                                    step = %self.steps[index].name,
                                    reason = %reason,
                                    "step not applicable; skipping"
                                );
                                let message = format!("skipped: {reason}");
                                finished.push(self.finish(
                                    index,
                                    StepStatus::Skipped,
                                    Some(reason),
                                    message,
                                ));
                            }
                            Eligibility::Fail(message) => {
                                let status = match self.steps[index].on_error {
                                    OnError::Stop => StepStatus::Error,
                                    OnError::Warn => StepStatus::Warn,
                                };
                                warn!(
                                    stage = resolver.stage,
                                    step = %self.steps[index].name,
                                    error = %message,
                                    "step failed before launch"
                                );
                                finished.push(self.finish(index, status, None, message));
                            }
                        }
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        finished
    }

    /// Launch up to `free_slots` ready steps, lowest declaration index first.
    pub fn dispatch_ready(&mut self, free_slots: usize) -> Vec<ScheduledStep> {
        let mut scheduled = Vec::new();

        for info in self.steps.iter_mut() {
            if scheduled.len() >= free_slots {
                break;
            }
            if !matches!(info.state, RunState::Ready(_)) {
                continue;
            }
            if let RunState::Ready(step) = std::mem::replace(&mut info.state, RunState::Running) {
                info!(step = %info.name, runnable = %step.runnable, "launching step");
                scheduled.push(*step);
            }
        }

        scheduled
    }

    /// Finalize every step that has not launched yet as skipped/cancelled.
    pub fn cancel_waiting(&mut self) -> Vec<FinishedStep> {
        let waiting: Vec<usize> = self
            .steps
            .iter()
            .filter(|info| matches!(info.state, RunState::Pending | RunState::Ready(_)))
            .map(|info| info.index)
            .collect();

        waiting
            .into_iter()
            .map(|index| {
                self.finish(
                    index,
                    StepStatus::Skipped,
                    Some(SkipReason::Cancelled),
                    "skipped: run cancelled".to_string(),
                )
            })
            .collect()
    }

    /// Check if all steps are in a terminal state.
    pub fn all_steps_terminal(&self) -> bool {
        self.steps.iter().all(|info| info.is_terminal())
    }
}

/// A read-only view over step states, for dependency checks.
pub struct ReadOnlyStateManager<'a> {
    steps: &'a [StepInfo],
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(steps: &'a [StepInfo]) -> Self {
        Self { steps }
    }

    /// Dependency state of the step at `index`.
    ///
    /// A blocking requirement wins over one that is still running, so
    /// dependents of a failure are skipped as soon as it happens.
    pub(crate) fn deps_state(&self, index: usize) -> DepsState {
        let mut waiting = false;

        for &dep in &self.steps[index].deps {
            let Some(dep_info) = self.steps.get(dep) else {
                warn!(
                    step = %self.steps[index].name,
                    dep,
                    "dependency missing from step table"
                );
                return DepsState::Waiting;
            };

            match &dep_info.state {
                RunState::Pending | RunState::Ready(_) | RunState::Running => waiting = true,
                RunState::Done { status, skip } => match (status, skip) {
                    (StepStatus::Error, _) => {
                        return DepsState::Blocked(SkipReason::Blocked(dep_info.name.clone()));
                    }
                    (StepStatus::Terminated, _) => {
                        return DepsState::Blocked(SkipReason::Cancelled);
                    }
                    (StepStatus::Skipped, Some(reason)) if reason.cascades() => {
                        return DepsState::Blocked(reason.clone());
                    }
                    _ => {}
                },
            }
        }

        if waiting {
            DepsState::Waiting
        } else {
            DepsState::Satisfied
        }
    }

    /// Whether every requirement of the step at `index` is terminal.
    pub fn deps_terminal(&self, index: usize) -> bool {
        self.steps[index]
            .deps
            .iter()
            .all(|&dep| self.steps.get(dep).is_some_and(|d| d.is_terminal()))
    }
}
