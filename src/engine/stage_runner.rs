// src/engine/stage_runner.rs

//! Wiring of one stage run: scheduler, executor, runtime and output task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::action::ActionTable;
use crate::dag::{PlannedStep, Scheduler, Stage};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent};
use crate::errors::{Result, StagerunError};
use crate::exec::ExecutorBackend;
use crate::expr::{Evaluator, ExpressionContext};
use crate::output::{OutputCoordinator, ProgressSink, spawn_output_task};
use crate::report::StageResult;

/// Everything that stays the same across the stages of one invocation.
#[derive(Debug, Clone)]
pub struct StageRunner {
    actions: Arc<ActionTable>,
    context: Arc<ExpressionContext>,
    evaluator: Evaluator,
    max_parallel: usize,
}

impl StageRunner {
    pub fn new(
        actions: Arc<ActionTable>,
        context: Arc<ExpressionContext>,
        evaluator: Evaluator,
        max_parallel: usize,
    ) -> Self {
        Self {
            actions,
            context,
            evaluator,
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub fn context(&self) -> &ExpressionContext {
        &self.context
    }

    fn scheduler(&self, stage: &Stage) -> Result<Scheduler> {
        Scheduler::from_stage(
            stage,
            self.actions.clone(),
            self.context.clone(),
            self.evaluator.clone(),
            self.max_parallel,
        )
    }

    /// Resolve `stage` without running it.
    pub fn plan(&self, stage: &Stage) -> Result<Vec<PlannedStep>> {
        Ok(self.scheduler(stage)?.plan())
    }

    /// Run `stage` to completion.
    ///
    /// `make_executor` receives the sender executors report to. Progress
    /// goes to `sink`, which is handed back together with the result. A
    /// config error is returned before anything starts.
    pub async fn run<E, S, F>(
        &self,
        stage: &Stage,
        make_executor: F,
        mut sink: S,
        cancel: CancellationToken,
    ) -> Result<(StageResult, S)>
    where
        E: ExecutorBackend,
        S: ProgressSink + 'static,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let scheduler = self.scheduler(stage)?;

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);
        let executor = make_executor(rt_tx);

        sink.stage_started(&stage.name, stage.steps.len());
        let coordinator = OutputCoordinator::new(stage.steps.iter().map(|s| s.name.clone()));
        let output = spawn_output_task(coordinator, sink);

        let runtime = Runtime::new(
            CoreRuntime::new(scheduler),
            rt_rx,
            executor,
            output.tx.clone(),
            cancel,
        );
        let result = runtime.run().await;

        // Closing the channel lets the output task flush and return the sink.
        drop(output.tx);
        let mut sink = output.handle.await.map_err(|e| {
            warn!(error = %e, "output task failed");
            StagerunError::Execution(format!("output task failed: {e}"))
        })?;

        let result = result?;
        sink.stage_finished(&result);
        Ok((result, sink))
    }
}
