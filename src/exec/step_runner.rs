// src/exec/step_runner.rs

//! Individual step runner.

use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::{BuiltinContext, Runnable};
use crate::dag::ScheduledStep;
use crate::engine::{RuntimeEvent, StepOutcome};
use crate::exec::{ExecSettings, OutputHandle};
use crate::types::{OutputLine, OutputStream};

/// How long to keep draining output after killing a process.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Run a single step, streaming its output and emitting exactly one
/// `StepCompleted` event.
///
/// - If `cancel` fires while the runnable is executing, a process is killed
///   and the step completes as `Terminated`.
/// - Execution errors (the process can't be spawned, waited on, ...) are
///   reported as a failed completion carrying the error text.
pub async fn run_step(
    step: ScheduledStep,
    settings: ExecSettings,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let name = step.name.clone();

    let outcome = match run_step_inner(&step, &settings, &runtime_tx, cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(step = %name, error = %format!("{err:#}"), "step execution error");
            StepOutcome::failed_with_error(format!("{err:#}"))
        }
    };

    let event = RuntimeEvent::StepCompleted {
        step: name.clone(),
        outcome,
        duration: started.elapsed(),
    };
    if runtime_tx.send(event).await.is_err() {
        warn!(step = %name, "runtime gone before step completion could be reported");
    }
}

async fn run_step_inner(
    step: &ScheduledStep,
    settings: &ExecSettings,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    cancel: CancellationToken,
) -> Result<StepOutcome> {
    let output = OutputHandle::new(step.name.clone(), runtime_tx.clone());

    match &step.runnable {
        Runnable::Command(cmd) => run_command(step, cmd, settings, output, cancel).await,
        Runnable::Builtin(builtin) => {
            let Some(builtin) = settings.builtins.get(builtin) else {
                return Ok(StepOutcome::failed_with_error(format!(
                    "builtin '{builtin}' is not registered"
                )));
            };

            info!(step = %step.name, builtin = %builtin.name(), "starting builtin");
            let ctx = BuiltinContext {
                step: &step.name,
                workdir: &settings.workdir,
                env: &step.env,
                output: &output,
                cancel,
            };
            builtin
                .run(ctx)
                .await
                .with_context(|| format!("running builtin '{}'", builtin.name()))
        }
    }
}

async fn run_command(
    step: &ScheduledStep,
    cmd_text: &str,
    settings: &ExecSettings,
    output: OutputHandle,
    cancel: CancellationToken,
) -> Result<StepOutcome> {
    info!(
        step = %step.name,
        cmd = %cmd_text,
        workdir = %settings.workdir.display(),
        "starting step process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_text);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_text);
        c
    };

    cmd.current_dir(&settings.workdir)
        .envs(&step.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for step '{}'", step.name))?;

    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, OutputStream::Stdout, output.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, OutputStream::Stderr, output.clone()));
    }

    // Either the process exits on its own (normal case), or the run is
    // cancelled and we kill it.
    let outcome = tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of step '{}'", step.name)
            })?;

            info!(
                step = %step.name,
                exit_code = ?status.code(),
                success = status.success(),
                "step process exited"
            );

            if status.success() {
                StepOutcome::Success
            } else {
                StepOutcome::Failed {
                    exit_code: status.code(),
                    error: None,
                }
            }
        }

        _ = cancel.cancelled() => {
            info!(step = %step.name, "cancellation requested; killing step process");
            if let Err(e) = child.kill().await {
                warn!(
                    step = %step.name,
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            StepOutcome::Terminated
        }
    };

    // Completion must not overtake the output it produced. A killed shell
    // can leave grandchildren holding the pipes open, so bound the wait then.
    for mut reader in readers {
        let joined = if outcome == StepOutcome::Terminated {
            match tokio::time::timeout(KILL_GRACE, &mut reader).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(step = %step.name, "output pipe still open after kill; abandoning reader");
                    reader.abort();
                    continue;
                }
            }
        } else {
            reader.await
        };
        if let Err(e) = joined {
            debug!(step = %step.name, error = %e, "output reader task failed");
        }
    }

    Ok(outcome)
}

fn spawn_line_reader<R>(reader: R, stream: OutputStream, output: OutputHandle) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = match stream {
                        OutputStream::Stdout => OutputLine::stdout(line),
                        OutputStream::Stderr => OutputLine::stderr(line),
                    };
                    output.emit(line).await;
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(step = %output.step(), error = %e, "error reading step output");
                    break;
                }
            }
        }
    })
}
