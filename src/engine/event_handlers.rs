// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::dag::{ScheduledStep, Scheduler, SchedulerStep};
use crate::engine::StepOutcome;
use crate::output::StepEvent;
use crate::report::StepResult;
use crate::types::{OutputLine, StepName, StepStatus};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these steps to the executor.
    DispatchSteps(Vec<ScheduledStep>),
    /// Forward a lifecycle event to the output coordinator.
    Emit(StepEvent),
    /// Ask the executor to terminate every running runnable.
    TerminateRunning,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Per-step results, addressed by step name.
#[derive(Debug)]
pub struct ResultTable {
    results: Vec<StepResult>,
    index: HashMap<StepName, usize>,
}

impl ResultTable {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let results: Vec<StepResult> = names.into_iter().map(StepResult::pending).collect();
        let index = results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self { results, index }
    }

    pub fn get_mut(&mut self, step: &str) -> Option<&mut StepResult> {
        let i = *self.index.get(step)?;
        self.results.get_mut(i)
    }

    pub fn as_slice(&self) -> &[StepResult] {
        &self.results
    }

    pub fn into_vec(self) -> Vec<StepResult> {
        self.results
    }
}

/// Translate a scheduler transition into core commands.
///
/// Terminal transitions are emitted first, then start events for the newly
/// launched steps, then the dispatch itself, so the coordinator always sees
/// `Started` before any output of a step.
pub fn apply_scheduler_step(
    scheduler: &Scheduler,
    results: &mut ResultTable,
    step: SchedulerStep,
) -> CoreStep {
    let mut commands = Vec::new();

    for finished in step.newly_finished {
        let Some(result) = results.get_mut(&finished.name) else {
            warn!(step = %finished.name, "finished step missing from result table");
            continue;
        };
        result.status = finished.status;
        result.message = finished.message;
        result.skip_reason = finished.skip_reason;
        if matches!(finished.status, StepStatus::Error | StepStatus::Warn)
            && result.error.is_none()
            && result.command.is_none()
        {
            // Failed before launch: the message is the error.
            result.error = Some(result.message.clone());
        }
        commands.push(CoreCommand::Emit(StepEvent::Finished {
            step: finished.name,
            summary: result.summary(),
        }));
    }

    for scheduled in &step.newly_scheduled {
        if let Some(result) = results.get_mut(&scheduled.name) {
            result.status = StepStatus::Running;
            result.command = Some(scheduled.runnable.to_string());
        }
        commands.push(CoreCommand::Emit(StepEvent::Started {
            step: scheduled.name.clone(),
        }));
    }

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchSteps(step.newly_scheduled));
    }

    if step.run_just_finished {
        debug!(stage = %scheduler.graph().stage(), "stage run complete");
    }

    CoreStep {
        commands,
        keep_running: !scheduler.is_finished(),
    }
}

/// Handle a line of output from a running step.
pub fn handle_step_output(
    scheduler: &Scheduler,
    results: &mut ResultTable,
    step: StepName,
    line: OutputLine,
) -> CoreStep {
    let mut commands = Vec::new();

    match results.get_mut(&step) {
        Some(result) if result.status == StepStatus::Running => {
            result.output.push(line.clone());
            commands.push(CoreCommand::Emit(StepEvent::Output { step, line }));
        }
        Some(result) => {
            warn!(step = %step, status = %result.status, "output from step that is not running; dropping");
        }
        None => warn!(step = %step, "output from unknown step; dropping"),
    }

    CoreStep {
        commands,
        keep_running: !scheduler.is_finished(),
    }
}

/// Handle a step completion event.
pub fn handle_step_completion(
    scheduler: &mut Scheduler,
    results: &mut ResultTable,
    step: StepName,
    outcome: StepOutcome,
    duration: Duration,
) -> CoreStep {
    if let Some(result) = results.get_mut(&step) {
        if result.status == StepStatus::Running {
            result.duration = duration;
            if let StepOutcome::Failed {
                error: Some(error), ..
            } = &outcome
            {
                result.error = Some(error.clone());
            }
        }
    }

    let transition = scheduler.handle_completion(&step, &outcome);
    apply_scheduler_step(scheduler, results, transition)
}

/// Handle a cancellation request.
pub fn handle_cancel(scheduler: &mut Scheduler, results: &mut ResultTable) -> CoreStep {
    let transition = scheduler.cancel();
    let mut core_step = apply_scheduler_step(scheduler, results, transition);

    if scheduler.running_count() > 0 {
        core_step.commands.push(CoreCommand::TerminateRunning);
    }

    core_step
}
