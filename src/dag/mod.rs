// src/dag/mod.rs

//! Stage graphs and scheduling.
//!
//! - [`stage`] holds the stage and step definitions.
//! - [`graph`] validates a stage into a directed acyclic graph of steps.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   steps are eligible, which are skipped, and when they launch.
//! - [`step_info`] provides step metadata and scheduled step types.
//! - [`scheduler_step`] defines the result type for scheduler transitions.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod stage;
pub mod state_manager;
pub mod step_info;

pub use graph::StageGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use stage::{Condition, Stage, Step};
pub use step_info::{FinishedStep, PlanDecision, PlannedStep, ScheduledStep, StepRunState};
