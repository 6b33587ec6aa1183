// src/exec/output_handle.rs

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::RuntimeEvent;
use crate::types::{OutputLine, StepName};

/// Sends output lines of one step to the runtime.
///
/// Lines sent through one handle arrive in the order they were sent.
#[derive(Debug, Clone)]
pub struct OutputHandle {
    step: StepName,
    tx: mpsc::Sender<RuntimeEvent>,
}

impl OutputHandle {
    pub fn new(step: impl Into<StepName>, tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            step: step.into(),
            tx,
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub async fn emit(&self, line: OutputLine) {
        let event = RuntimeEvent::StepOutput {
            step: self.step.clone(),
            line,
        };
        if self.tx.send(event).await.is_err() {
            debug!(step = %self.step, "runtime gone; dropping output line");
        }
    }

    pub async fn stdout(&self, text: impl Into<String>) {
        self.emit(OutputLine::stdout(text)).await;
    }

    pub async fn stderr(&self, text: impl Into<String>) {
        self.emit(OutputLine::stderr(text)).await;
    }
}
