// src/exec/executor_loop.rs

//! Background executor loop that manages running steps.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::ScheduledStep;
use crate::engine::RuntimeEvent;
use crate::exec::ExecSettings;
use crate::exec::step_runner::run_step;

/// Requests the runtime sends to the executor loop.
#[derive(Debug, Clone)]
pub enum ExecRequest {
    Run(ScheduledStep),
    /// Kill every running step; each still reports its completion.
    TerminateAll,
}

/// Internal handle for a currently-running step.
struct ActiveStep {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Each scheduled step is executed in its own Tokio task, and **per step
/// name there will never be more than one runner at the same time**: a
/// second request for a step that is still running is ignored.
///
/// `cancel` is the run-wide token; every runner gets a child of it, so
/// cancelling the run and `TerminateAll` both stop running steps.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    settings: ExecSettings,
    cancel: CancellationToken,
) -> mpsc::Sender<ExecRequest> {
    let (tx, mut rx) = mpsc::channel::<ExecRequest>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<String, ActiveStep> = HashMap::new();

        while let Some(request) = rx.recv().await {
            match request {
                ExecRequest::Run(step) => {
                    handle_scheduled_step(step, &mut active, &settings, &runtime_tx, &cancel);
                }
                ExecRequest::TerminateAll => terminate_all(&mut active),
            }
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Handle a newly scheduled step.
fn handle_scheduled_step(
    step: ScheduledStep,
    active: &mut HashMap<String, ActiveStep>,
    settings: &ExecSettings,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    cancel: &CancellationToken,
) {
    active.retain(|_, a| !a.handle.is_finished());

    if active.contains_key(&step.name) {
        warn!(
            step = %step.name,
            "step already running; ignoring duplicate scheduling request"
        );
        return;
    }

    let step_cancel = cancel.child_token();
    let name = step.name.clone();
    let spawn_name = name.clone();
    let settings = settings.clone();
    let runtime_tx = runtime_tx.clone();
    let runner_cancel = step_cancel.clone();

    let handle = tokio::spawn(async move {
        run_step(step, settings, runtime_tx, runner_cancel).await;
        debug!(step = %spawn_name, "step runner future finished");
    });

    active.insert(
        name,
        ActiveStep {
            cancel: step_cancel,
            handle,
        },
    );
}

fn terminate_all(active: &mut HashMap<String, ActiveStep>) {
    for (name, step) in active.iter() {
        if step.handle.is_finished() {
            continue;
        }
        info!(step = %name, "terminating running step");
        step.cancel.cancel();
    }
}
