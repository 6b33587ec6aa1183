// src/dag/scheduler.rs

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::action::ActionTable;
use crate::dag::graph::StageGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::stage::Stage;
use crate::dag::state_manager::{Eligibility, ReadOnlyStateManager, StateManager, StepResolver};
use crate::dag::step_info::{
    FinishedStep, PlanDecision, PlannedStep, RunState, StepInfo, StepRunState,
};
use crate::engine::StepOutcome;
use crate::errors::Result;
use crate::expr::{Evaluator, ExpressionContext};
use crate::types::{OnError, StepStatus};

/// Scheduler holds the immutable stage graph plus mutable per-run state.
///
/// It is responsible for:
/// - deciding when a step is eligible (every requirement terminal)
/// - evaluating predicates and variant guards exactly once, at eligibility
/// - keeping at most `max_parallel` steps running
/// - skipping dependents, transitively, as soon as a requirement fails
///
/// It performs no IO; the runtime feeds it completions and executes what it
/// schedules.
#[derive(Debug)]
pub struct Scheduler {
    graph: StageGraph,
    steps: Vec<StepInfo>,
    actions: Arc<ActionTable>,
    context: Arc<ExpressionContext>,
    evaluator: Evaluator,
    max_parallel: usize,
    started: bool,
    cancelled: bool,
    finished: bool,
}

impl Scheduler {
    /// Build the graph for `stage` and prepare a fresh run.
    ///
    /// Fails with the same errors as [`StageGraph::build`]; nothing has been
    /// started when it does.
    pub fn from_stage(
        stage: &Stage,
        actions: Arc<ActionTable>,
        context: Arc<ExpressionContext>,
        evaluator: Evaluator,
        max_parallel: usize,
    ) -> Result<Self> {
        let graph = StageGraph::build(stage, &actions)?;

        let steps = stage
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepInfo::from_step(i, step, graph.dependencies_of(i).to_vec()))
            .collect();

        Ok(Self {
            graph,
            steps,
            actions,
            context,
            evaluator,
            max_parallel: max_parallel.max(1),
            started: false,
            cancelled: false,
            finished: false,
        })
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Step names in declaration order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.graph.steps()
    }

    /// Read-only view of the given step's run state.
    pub fn run_state_of(&self, step: &str) -> Option<StepRunState> {
        let index = self.graph.index_of(step)?;
        Some((&self.steps[index].state).into())
    }

    /// Whether every requirement of `step` is terminal.
    ///
    /// Returns `None` if the step is unknown.
    pub fn deps_terminal(&self, step: &str) -> Option<bool> {
        let index = self.graph.index_of(step)?;
        Some(ReadOnlyStateManager::new(&self.steps).deps_terminal(index))
    }

    pub fn running_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.state == RunState::Running)
            .count()
    }

    /// Whether every step has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Resolve every step against the context without running anything,
    /// assuming all requirements succeed.
    pub fn plan(&self) -> Vec<PlannedStep> {
        let resolver = StepResolver {
            stage: self.graph.stage(),
            actions: &self.actions,
            context: &self.context,
            evaluator: &self.evaluator,
        };

        self.steps
            .iter()
            .map(|info| {
                let decision = match resolver.resolve(info) {
                    Eligibility::Run(scheduled) => PlanDecision::Run(scheduled.runnable),
                    Eligibility::Skip(reason) => PlanDecision::Skip(reason),
                    Eligibility::Fail(message) => PlanDecision::Invalid(message),
                };
                PlannedStep {
                    name: info.name.clone(),
                    level: self.graph.level_of(info.index),
                    requires: info
                        .deps
                        .iter()
                        .map(|&d| self.graph.name(d).to_string())
                        .collect(),
                    decision,
                }
            })
            .collect()
    }

    /// Begin the run: resolve root steps and launch as many as fit.
    ///
    /// Calling it twice is a no-op the second time.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(stage = %self.graph.stage(), "scheduler already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;
        debug!(
            stage = %self.graph.stage(),
            steps = self.steps.len(),
            max_parallel = self.max_parallel,
            "scheduler: starting stage run"
        );

        self.advance(Vec::new())
    }

    /// Record how a running step ended and schedule whatever that unblocks.
    pub fn handle_completion(&mut self, step: &str, outcome: &StepOutcome) -> SchedulerStep {
        let Some(index) = self.graph.index_of(step) else {
            warn!(step = %step, "completion for unknown step; ignoring");
            return SchedulerStep::default();
        };

        if self.steps[index].state != RunState::Running {
            warn!(
                step = %step,
                state = ?StepRunState::from(&self.steps[index].state),
                "completion for step that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        let on_error = self.steps[index].on_error;
        let (status, message) = completion_status(outcome, on_error);
        match status {
            StepStatus::Error => warn!(step = %step, %message, "step failed; skipping dependents"),
            StepStatus::Warn => info!(step = %step, %message, "step finished with warning"),
            _ => debug!(step = %step, %status, "step completed"),
        }

        let finished = StateManager::new(&mut self.steps).finish(index, status, None, message);
        self.advance(vec![finished])
    }

    /// Stop launching steps. Steps not yet running are finalized as skipped;
    /// running steps stay running until their completion arrives.
    pub fn cancel(&mut self) -> SchedulerStep {
        if self.cancelled {
            return SchedulerStep::default();
        }
        self.cancelled = true;
        info!(
            stage = %self.graph.stage(),
            running = self.running_count(),
            "scheduler: cancellation requested"
        );

        let newly_finished = StateManager::new(&mut self.steps).cancel_waiting();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_finished,
            run_just_finished,
        }
    }

    /// Promote eligible steps, then fill free slots, then check for the end
    /// of the run.
    fn advance(&mut self, mut newly_finished: Vec<FinishedStep>) -> SchedulerStep {
        let mut newly_scheduled = Vec::new();

        if !self.cancelled {
            let resolver = StepResolver {
                stage: self.graph.stage(),
                actions: &self.actions,
                context: &self.context,
                evaluator: &self.evaluator,
            };
            let mut manager = StateManager::new(&mut self.steps);
            newly_finished.extend(manager.promote_eligible(&resolver));

            let running = self
                .steps
                .iter()
                .filter(|s| s.state == RunState::Running)
                .count();
            let free_slots = self.max_parallel.saturating_sub(running);
            newly_scheduled = StateManager::new(&mut self.steps).dispatch_ready(free_slots);
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_finished,
            run_just_finished,
        }
    }

    /// Returns `true` if this call observed the run becoming complete.
    fn maybe_finish_run(&mut self) -> bool {
        if self.finished {
            return false;
        }
        if StateManager::new(&mut self.steps).all_steps_terminal() {
            info!(stage = %self.graph.stage(), "scheduler: all steps terminal");
            self.finished = true;
            true
        } else {
            false
        }
    }
}

/// Map how an execution ended onto the step's final status.
fn completion_status(outcome: &StepOutcome, on_error: OnError) -> (StepStatus, String) {
    match outcome {
        StepOutcome::Success => (StepStatus::Ok, String::new()),
        StepOutcome::Warning(message) => (StepStatus::Warn, message.clone()),
        StepOutcome::Failed { exit_code, error } => {
            let message = match (error, exit_code) {
                (Some(error), _) => error.clone(),
                (None, Some(code)) => format!("exited with status {code}"),
                (None, None) => "failed".to_string(),
            };
            let status = match on_error {
                OnError::Stop => StepStatus::Error,
                OnError::Warn => StepStatus::Warn,
            };
            (status, message)
        }
        StepOutcome::Terminated => (StepStatus::Terminated, "terminated".to_string()),
    }
}
