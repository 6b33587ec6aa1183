// src/report.rs

//! Per-step results and their aggregation into a stage result.

use std::fmt;
use std::time::Duration;

use crate::types::{OutputLine, SkipReason, StepName, StepStatus};

/// Everything known about one step at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub name: StepName,
    pub status: StepStatus,
    /// Short human-readable explanation; empty for plain successes.
    pub message: String,
    /// Underlying error text, when the runnable produced one.
    pub error: Option<String>,
    pub duration: Duration,
    /// Captured output, in the order it was produced.
    pub output: Vec<OutputLine>,
    pub skip_reason: Option<SkipReason>,
    /// The resolved command, for steps that were launched.
    pub command: Option<String>,
}

impl StepResult {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            message: String::new(),
            error: None,
            duration: Duration::ZERO,
            output: Vec::new(),
            skip_reason: None,
            command: None,
        }
    }

    /// Message to show the user for this result.
    ///
    /// Prefers the underlying error, then the step's own message, then the
    /// bare status, so an `error` status without an error value still reads
    /// sensibly.
    pub fn display_message(&self) -> String {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return error.to_string();
        }
        if !self.message.is_empty() {
            return self.message.clone();
        }
        match self.status {
            StepStatus::Error => "failed".to_string(),
            other => other.to_string(),
        }
    }

    pub fn summary(&self) -> StepSummary {
        StepSummary {
            status: self.status,
            message: self.display_message(),
            skip_reason: self.skip_reason.clone(),
            duration: self.duration,
            command: self.command.clone(),
        }
    }
}

/// What the presentation layer needs to render a step's terminal line.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    pub status: StepStatus,
    pub message: String,
    pub skip_reason: Option<SkipReason>,
    pub duration: Duration,
    pub command: Option<String>,
}

impl StepSummary {
    /// Summary used for steps that never reported a terminal status.
    pub fn terminated() -> Self {
        Self {
            status: StepStatus::Terminated,
            message: "terminated".to_string(),
            skip_reason: None,
            duration: Duration::ZERO,
            command: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub ok: usize,
    pub warn: usize,
    pub error: usize,
    pub skipped: usize,
    pub terminated: usize,
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ok, {} warn, {} error, {} skipped",
            self.ok, self.warn, self.error, self.skipped
        )?;
        if self.terminated > 0 {
            write!(f, ", {} terminated", self.terminated)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failed,
    Terminated,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageOutcome::Success => "ok",
            StageOutcome::Failed => "error",
            StageOutcome::Terminated => "terminated",
        })
    }
}

/// Results of every step of a stage, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub stage: String,
    pub steps: Vec<StepResult>,
    pub duration: Duration,
    pub cancelled: bool,
}

impl StageResult {
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for step in &self.steps {
            match step.status {
                StepStatus::Ok => counts.ok += 1,
                StepStatus::Warn => counts.warn += 1,
                StepStatus::Error => counts.error += 1,
                StepStatus::Skipped => counts.skipped += 1,
                StepStatus::Terminated => counts.terminated += 1,
                StepStatus::Pending | StepStatus::Running => {}
            }
        }
        counts
    }

    /// No step ended in `error`.
    pub fn success(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Error)
    }

    pub fn outcome(&self) -> StageOutcome {
        if self.cancelled {
            StageOutcome::Terminated
        } else if self.success() {
            StageOutcome::Success
        } else {
            StageOutcome::Failed
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "stage '{}' {}: {} in {:.2?}",
            self.stage,
            self.outcome(),
            self.counts(),
            self.duration
        )
    }
}
