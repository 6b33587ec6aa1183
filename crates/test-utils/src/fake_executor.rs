//! Scriptable in-process executor.
//!
//! Each step's behaviour (outcome, output, latency) is set up front. Every
//! dispatch and completion is appended to a shared [`ExecLog`], so tests can
//! assert on start order, dependency order and peak concurrency.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagerun::dag::ScheduledStep;
use stagerun::engine::{RuntimeEvent, StepOutcome};
use stagerun::errors::Result;
use stagerun::exec::ExecutorBackend;
use stagerun::types::OutputLine;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a fake step does once dispatched.
#[derive(Debug, Clone)]
pub struct FakeStep {
    pub outcome: StepOutcome,
    pub output: Vec<OutputLine>,
    /// `None` runs until `terminate_all`.
    pub latency: Option<Duration>,
}

impl FakeStep {
    pub fn ok() -> Self {
        Self {
            outcome: StepOutcome::Success,
            output: Vec::new(),
            latency: Some(Duration::from_millis(5)),
        }
    }

    pub fn failing(exit_code: i32) -> Self {
        Self {
            outcome: StepOutcome::failed_with_code(exit_code),
            ..Self::ok()
        }
    }

    /// Never finishes by itself.
    pub fn hang() -> Self {
        Self {
            latency: None,
            ..Self::ok()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_output(mut self, line: OutputLine) -> Self {
        self.output.push(line);
        self
    }
}

/// Per-step behaviour; unscripted steps behave like [`FakeStep::ok`].
#[derive(Debug, Clone, Default)]
pub struct FakeScript {
    steps: HashMap<String, FakeStep>,
}

impl FakeScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, name: &str, behaviour: FakeStep) -> Self {
        self.steps.insert(name.to_string(), behaviour);
        self
    }

    fn get(&self, name: &str) -> FakeStep {
        self.steps.get(name).cloned().unwrap_or_else(FakeStep::ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecRecord {
    Started(String),
    Finished(String),
}

/// Shared record of what the fake executor did.
#[derive(Debug, Default)]
pub struct ExecLog {
    pub records: Vec<ExecRecord>,
    pub running: usize,
    pub max_running: usize,
}

impl ExecLog {
    pub fn started(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ExecRecord::Started(name) => Some(name.clone()),
                ExecRecord::Finished(_) => None,
            })
            .collect()
    }

    /// Position of `record` in the log, if present.
    pub fn position(&self, record: &ExecRecord) -> Option<usize> {
        self.records.iter().position(|r| r == record)
    }
}

/// Handle tests keep after the executor has been moved into the runtime.
#[derive(Debug, Clone, Default)]
pub struct ExecProbe {
    log: Arc<Mutex<ExecLog>>,
    changed: Arc<Notify>,
}

impl ExecProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<String> {
        self.log.lock().unwrap().started()
    }

    pub fn running(&self) -> usize {
        self.log.lock().unwrap().running
    }

    pub fn max_running(&self) -> usize {
        self.log.lock().unwrap().max_running
    }

    pub fn records(&self) -> Vec<ExecRecord> {
        self.log.lock().unwrap().records.clone()
    }

    /// Wait until at least `n` steps are running at once.
    pub async fn wait_for_running(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.running() >= n {
                return;
            }
            notified.await;
        }
    }

    fn record_start(&self, name: &str) {
        {
            let mut log = self.log.lock().unwrap();
            log.records.push(ExecRecord::Started(name.to_string()));
            log.running += 1;
            log.max_running = log.max_running.max(log.running);
        }
        self.changed.notify_waiters();
    }

    fn record_finish(&self, name: &str) {
        {
            let mut log = self.log.lock().unwrap();
            log.records.push(ExecRecord::Finished(name.to_string()));
            log.running -= 1;
        }
        self.changed.notify_waiters();
    }
}

/// `ExecutorBackend` that plays back a [`FakeScript`].
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    script: Arc<FakeScript>,
    probe: ExecProbe,
    cancel: CancellationToken,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, script: FakeScript, probe: ExecProbe) -> Self {
        Self {
            runtime_tx,
            script: Arc::new(script),
            probe,
            cancel: CancellationToken::new(),
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_steps(
        &mut self,
        steps: Vec<ScheduledStep>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for step in steps {
            let behaviour = self.script.get(&step.name);
            let tx = self.runtime_tx.clone();
            let probe = self.probe.clone();
            let cancel = self.cancel.clone();

            // Record synchronously so the log reflects dispatch order.
            probe.record_start(&step.name);
            debug!(step = %step.name, latency = ?behaviour.latency, "fake step dispatched");

            tokio::spawn(async move {
                for line in behaviour.output {
                    let _ = tx
                        .send(RuntimeEvent::StepOutput {
                            step: step.name.clone(),
                            line,
                        })
                        .await;
                }

                let outcome = match behaviour.latency {
                    Some(latency) => tokio::select! {
                        _ = tokio::time::sleep(latency) => behaviour.outcome,
                        _ = cancel.cancelled() => StepOutcome::Terminated,
                    },
                    None => {
                        cancel.cancelled().await;
                        StepOutcome::Terminated
                    }
                };

                probe.record_finish(&step.name);
                let _ = tx
                    .send(RuntimeEvent::StepCompleted {
                        step: step.name.clone(),
                        outcome,
                        duration: behaviour.latency.unwrap_or_default(),
                    })
                    .await;
            });
        }

        Box::pin(async { Ok(()) })
    }

    fn terminate_all(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        debug!("fake executor terminating all steps");
        self.cancel.cancel();
        Box::pin(async { Ok(()) })
    }
}
