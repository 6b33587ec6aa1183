// src/dag/scheduler_step.rs

//! Result type for a single scheduler transition.

use crate::dag::step_info::{FinishedStep, ScheduledStep};

/// Structured result of a single scheduler "step".
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Steps that should be launched now, in declaration order.
    pub newly_scheduled: Vec<ScheduledStep>,
    /// Steps that became terminal in this step, in the order they did so.
    /// Includes the completed step itself for completions.
    pub newly_finished: Vec<FinishedStep>,
    /// Whether this step left every step of the stage terminal.
    pub run_just_finished: bool,
}
