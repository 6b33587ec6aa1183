// src/dag/step_info.rs

//! Per-step metadata and per-run state.

use std::collections::BTreeMap;

use crate::action::Runnable;
use crate::dag::stage::{Condition, Step};
use crate::types::{OnError, SkipReason, StepName, StepStatus};

/// Per-run state of a step (internal).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RunState {
    /// Waiting on requirements.
    Pending,
    /// Requirements terminal, predicate passed and action resolved; waiting
    /// for a free slot.
    Ready(Box<ScheduledStep>),
    /// Handed to the executor.
    Running,
    /// Terminal. Never changes again.
    Done {
        status: StepStatus,
        skip: Option<SkipReason>,
    },
}

/// Public, read-only view of a step's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRunState {
    Pending,
    Ready,
    Running,
    Done(StepStatus),
}

impl From<&RunState> for StepRunState {
    fn from(state: &RunState) -> Self {
        match state {
            RunState::Pending => StepRunState::Pending,
            RunState::Ready(_) => StepRunState::Ready,
            RunState::Running => StepRunState::Running,
            RunState::Done { status, .. } => StepRunState::Done(*status),
        }
    }
}

/// Static step information plus its state in the current run.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub index: usize,
    pub name: StepName,
    pub action: String,
    /// Declaration indices of direct requirements.
    pub deps: Vec<usize>,
    pub on_error: OnError,
    pub condition: Option<Condition>,
    pub(crate) state: RunState,
}

impl StepInfo {
    pub fn from_step(index: usize, step: &Step, deps: Vec<usize>) -> Self {
        Self {
            index,
            name: step.name.clone(),
            action: step.action.clone(),
            deps,
            on_error: step.on_error,
            condition: step.condition.clone(),
            state: RunState::Pending,
        }
    }

    pub fn status(&self) -> StepStatus {
        match &self.state {
            RunState::Pending | RunState::Ready(_) => StepStatus::Pending,
            RunState::Running => StepStatus::Running,
            RunState::Done { status, .. } => *status,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// A step the scheduler wants the executor to run now.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledStep {
    pub stage: String,
    pub index: usize,
    pub name: StepName,
    pub action: String,
    /// Resolved and interpolated runnable.
    pub runnable: Runnable,
    /// Interpolated extra environment.
    pub env: BTreeMap<String, String>,
    pub on_error: OnError,
}

/// A step that reached a terminal status during a scheduler step.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedStep {
    pub index: usize,
    pub name: StepName,
    pub status: StepStatus,
    pub skip_reason: Option<SkipReason>,
    /// Human-readable explanation; may be empty for plain successes.
    pub message: String,
}

/// What a step would do if its requirements succeeded; used for dry runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanDecision {
    Run(Runnable),
    Skip(SkipReason),
    /// A predicate, guard or template failed to evaluate.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub name: StepName,
    /// Longest requirement chain below this step.
    pub level: usize,
    pub requires: Vec<StepName>,
    pub decision: PlanDecision,
}
