// src/output/event.rs

use crate::report::StepSummary;
use crate::types::{OutputLine, StepName};

/// Lifecycle event as produced by the runtime, in completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Started { step: StepName },
    Output { step: StepName, line: OutputLine },
    Finished { step: StepName, summary: StepSummary },
}

impl StepEvent {
    pub fn step(&self) -> &str {
        match self {
            StepEvent::Started { step }
            | StepEvent::Output { step, .. }
            | StepEvent::Finished { step, .. } => step,
        }
    }
}

/// Event handed to a [`ProgressSink`](super::ProgressSink), in declaration
/// order. Every step gets exactly one `Start` and one `Finish`, with its
/// output lines in between.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Start { step: StepName },
    Output { step: StepName, line: OutputLine },
    Finish { step: StepName, summary: StepSummary },
}

impl ProgressEvent {
    pub fn step(&self) -> &str {
        match self {
            ProgressEvent::Start { step }
            | ProgressEvent::Output { step, .. }
            | ProgressEvent::Finish { step, .. } => step,
        }
    }
}
