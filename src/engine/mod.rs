// src/engine/mod.rs

//! Orchestration engine for one stage run.
//!
//! This module ties together:
//! - the per-stage scheduler
//! - the executor backend that runs scheduled steps
//! - the ordered output coordinator that lifecycle events are sent to
//! - the runtime event loop that reacts to:
//!   - output lines from running steps
//!   - step completion events
//!   - cancellation
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::types::{OutputLine, StepName};

/// How the execution of a runnable ended, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Finished, but with something the user should look at.
    Warning(String),
    /// Non-zero exit or an execution error. `error` is `None` when the
    /// runnable simply exited unsuccessfully.
    Failed {
        exit_code: Option<i32>,
        error: Option<String>,
    },
    /// Killed because the run was cancelled.
    Terminated,
}

impl StepOutcome {
    pub fn failed_with_code(code: i32) -> Self {
        StepOutcome::Failed {
            exit_code: Some(code),
            error: None,
        }
    }

    pub fn failed_with_error(error: impl Into<String>) -> Self {
        StepOutcome::Failed {
            exit_code: None,
            error: Some(error.into()),
        }
    }
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A running step produced one line of output.
    StepOutput { step: StepName, line: OutputLine },
    /// A step's runnable finished.
    StepCompleted {
        step: StepName,
        outcome: StepOutcome,
        duration: Duration,
    },
    /// Stop launching steps and terminate the running ones.
    CancelRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod stage_runner;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use stage_runner::StageRunner;
