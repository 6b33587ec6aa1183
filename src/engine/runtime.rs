// src/engine/runtime.rs

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::ScheduledStep;
use crate::errors::{Result, StagerunError};
use crate::exec::ExecutorBackend;
use crate::output::StepEvent;
use crate::report::StageResult;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives one stage's scheduler in response to `RuntimeEvent`s, delegates
/// execution to an `ExecutorBackend` and forwards lifecycle events to the
/// output coordinator.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    output_tx: mpsc::Sender<StepEvent>,
    cancel: CancellationToken,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        output_tx: mpsc::Sender<StepEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            output_tx,
            cancel,
        }
    }

    /// Main event loop.
    ///
    /// - Starts the stage and dispatches its root steps.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them into the core.
    /// - Turns a fired cancellation token into a single `CancelRequested`.
    /// - Returns once every step of the stage is terminal.
    pub async fn run(mut self) -> Result<StageResult> {
        let started = Instant::now();
        info!(stage = %self.core.stage(), "stage run started");

        let step = self.core.start();
        for command in step.commands {
            self.execute_command(command).await?;
        }

        let mut cancel_seen = false;

        while !self.core.is_finished() {
            let event = tokio::select! {
                biased;

                _ = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    RuntimeEvent::CancelRequested
                }

                maybe_event = self.event_rx.recv() => match maybe_event {
                    Some(e) => e,
                    None => {
                        warn!(
                            stage = %self.core.stage(),
                            running = self.core.scheduler().running_count(),
                            "runtime event channel closed with steps outstanding"
                        );
                        return Err(StagerunError::Execution(
                            "executor stopped reporting before the stage finished".to_string(),
                        ));
                    }
                },
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                break;
            }
        }

        let result = self.core.into_result(started.elapsed());
        info!(
            stage = %result.stage,
            outcome = %result.outcome(),
            "stage run finished"
        );
        Ok(result)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchSteps(steps) => {
                self.spawn_ready(steps).await?;
            }
            CoreCommand::Emit(event) => {
                if self.output_tx.send(event).await.is_err() {
                    warn!("output coordinator is gone; dropping lifecycle event");
                }
            }
            CoreCommand::TerminateRunning => {
                info!(stage = %self.core.stage(), "terminating running steps");
                self.executor.terminate_all().await?;
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, steps: Vec<ScheduledStep>) -> Result<()> {
        if steps.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
        debug!(?names, "spawning ready steps");

        self.executor.spawn_ready_steps(steps).await
    }
}
