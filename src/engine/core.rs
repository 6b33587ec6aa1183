// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state (scheduler plus per-step results)
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledStep`s to the executor
//! - forwarding lifecycle events to the output coordinator
//! - observing the cancellation token
//!
//! The core can be unit tested without any Tokio, channels, filesystem,
//! or processes.

use std::time::Duration;

use crate::dag::Scheduler;
use crate::engine::RuntimeEvent;
use crate::engine::event_handlers::{
    CoreStep, ResultTable, apply_scheduler_step, handle_cancel, handle_step_completion,
    handle_step_output,
};
use crate::report::{StageResult, StepResult};

/// Pure core runtime state.
///
/// This owns:
/// - the stage scheduler
/// - the per-step results being accumulated
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    results: ResultTable,
    cancelled: bool,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        let results = ResultTable::new(scheduler.step_names());
        Self {
            scheduler,
            results,
            cancelled: false,
        }
    }

    pub fn stage(&self) -> &str {
        self.scheduler.graph().stage()
    }

    /// Whether every step of the stage is terminal.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn results(&self) -> &[StepResult] {
        self.results.as_slice()
    }

    /// Kick off the run: resolve and launch the root steps.
    pub fn start(&mut self) -> CoreStep {
        let transition = self.scheduler.start();
        apply_scheduler_step(&self.scheduler, &mut self.results, transition)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::StepOutput { step, line } => {
                handle_step_output(&self.scheduler, &mut self.results, step, line)
            }
            RuntimeEvent::StepCompleted {
                step,
                outcome,
                duration,
            } => handle_step_completion(
                &mut self.scheduler,
                &mut self.results,
                step,
                outcome,
                duration,
            ),
            RuntimeEvent::CancelRequested => {
                self.cancelled = true;
                handle_cancel(&mut self.scheduler, &mut self.results)
            }
        }
    }

    /// Consume the core and aggregate the stage result.
    pub fn into_result(self, duration: Duration) -> StageResult {
        StageResult {
            stage: self.scheduler.graph().stage().to_string(),
            steps: self.results.into_vec(),
            duration,
            cancelled: self.cancelled,
        }
    }
}
