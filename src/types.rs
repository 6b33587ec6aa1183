use std::fmt;

use serde::Deserialize;

/// Canonical step name type.
pub type StepName = String;

/// What a failure of this step means for the steps that require it.
///
/// - `Stop` (default): the step ends in `error` and every transitive
///   dependent is skipped.
/// - `Warn`: the step ends in `warn` and dependents run as if it had
///   succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    #[default]
    Stop,
    Warn,
}

/// Lifecycle status of a step within one stage run.
///
/// `Pending -> Running -> {Ok | Warn | Error | Terminated}` or
/// `Pending -> Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    Pending,
    Running,
    Ok,
    Warn,
    Error,
    Skipped,
    /// The run was cancelled while this step was executing.
    Terminated,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Ok => "ok",
            StepStatus::Warn => "warn",
            StepStatus::Error => "error",
            StepStatus::Skipped => "skipped",
            StepStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step was skipped without running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Its `if` / `only` predicate was false.
    ConditionNotMet,
    /// Its action has variants and no guard matched.
    NoMatchingVariant,
    /// A required step failed with `on_error = "stop"`; holds that step's name.
    Blocked(StepName),
    /// The run was cancelled before the step could start.
    Cancelled,
}

impl SkipReason {
    /// Whether dependents of a step skipped for this reason must be skipped too.
    pub fn cascades(&self) -> bool {
        matches!(self, SkipReason::Blocked(_) | SkipReason::Cancelled)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ConditionNotMet => f.write_str("condition not met"),
            SkipReason::NoMatchingVariant => f.write_str("no matching variant"),
            SkipReason::Blocked(dep) => write!(f, "{dep}"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One complete line of step output. Partial lines are never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}
