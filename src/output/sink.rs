// src/output/sink.rs

//! Presentation of ordered progress events.

use std::io::{self, Write};
use std::path::PathBuf;

use tracing::warn;

use crate::output::event::ProgressEvent;
use crate::report::{StageResult, StepSummary};
use crate::types::{OutputStream, StepStatus};

/// Receives progress events in declaration order.
pub trait ProgressSink: Send {
    fn stage_started(&mut self, _stage: &str, _steps: usize) {}

    fn event(&mut self, event: &ProgressEvent);

    fn stage_finished(&mut self, _result: &StageResult) {}
}

/// Plain-text renderer for a terminal or a CI log.
///
/// ```text
/// ==> build
///     | compiling...
/// <== build ok (1.20s)
/// ```
pub struct TerminalSink<W: Write + Send> {
    out: W,
    /// Shown in the re-run hint of failed steps.
    workdir: Option<PathBuf>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, workdir: None }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &ProgressEvent) -> io::Result<()> {
        match event {
            ProgressEvent::Start { step } => writeln!(self.out, "==> {step}"),
            ProgressEvent::Output { line, .. } => match line.stream {
                OutputStream::Stdout => writeln!(self.out, "    | {}", line.text),
                OutputStream::Stderr => writeln!(self.out, "    ! {}", line.text),
            },
            ProgressEvent::Finish { step, summary } => self.write_finish(step, summary),
        }
    }

    fn write_finish(&mut self, step: &str, summary: &StepSummary) -> io::Result<()> {
        match summary.status {
            StepStatus::Ok => {
                writeln!(self.out, "<== {step} ok ({:.2?})", summary.duration)
            }
            StepStatus::Skipped => {
                let reason = summary
                    .skip_reason
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| summary.message.clone());
                writeln!(self.out, "<== {step} skipped ({reason})")
            }
            StepStatus::Error => {
                writeln!(
                    self.out,
                    "<== {step} error: {} ({:.2?})",
                    summary.message, summary.duration
                )?;
                if let Some(command) = &summary.command {
                    match &self.workdir {
                        Some(dir) => writeln!(
                            self.out,
                            "    re-run: cd {} && {command}",
                            dir.display()
                        ),
                        None => writeln!(self.out, "    re-run: {command}"),
                    }?;
                }
                Ok(())
            }
            status => writeln!(
                self.out,
                "<== {step} {status}: {} ({:.2?})",
                summary.message, summary.duration
            ),
        }
    }
}

impl<W: Write + Send> ProgressSink for TerminalSink<W> {
    fn stage_started(&mut self, stage: &str, steps: usize) {
        if let Err(e) = writeln!(self.out, "stage '{stage}' ({steps} steps)") {
            warn!(error = %e, "failed to write progress");
        }
    }

    fn event(&mut self, event: &ProgressEvent) {
        if let Err(e) = self.write_event(event).and_then(|_| self.out.flush()) {
            warn!(error = %e, "failed to write progress");
        }
    }

    fn stage_finished(&mut self, result: &StageResult) {
        if let Err(e) = writeln!(self.out, "{}", result.summary_line()) {
            warn!(error = %e, "failed to write progress");
        }
    }
}
