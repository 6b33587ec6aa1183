// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`executor_loop`](super::executor_loop).
//!
//! - `RealExecutorBackend` is the default implementation. It wraps the
//!   background executor loop and forwards requests over an mpsc channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which steps were scheduled and directly emits `StepCompleted` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dag::ScheduledStep;
use crate::engine::RuntimeEvent;
use crate::errors::{Result, StagerunError};
use crate::exec::ExecSettings;

use super::executor_loop::{ExecRequest, spawn_executor};

/// Trait abstracting how scheduled steps are executed.
///
/// Every dispatched step must eventually produce exactly one
/// `RuntimeEvent::StepCompleted`, including after `terminate_all`.
pub trait ExecutorBackend: Send {
    /// Dispatch the given steps for execution.
    fn spawn_ready_steps(
        &mut self,
        steps: Vec<ScheduledStep>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Ask every running step to stop.
    fn terminate_all(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ExecRequest>,
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given runtime
    /// event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        settings: ExecSettings,
        cancel: CancellationToken,
    ) -> Self {
        let tx = spawn_executor(runtime_tx, settings, cancel);
        Self { tx }
    }
}

fn loop_gone<T>(_: mpsc::error::SendError<T>) -> StagerunError {
    StagerunError::Execution("executor loop is no longer running".to_string())
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_steps(
        &mut self,
        steps: Vec<ScheduledStep>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for step in steps {
                tx.send(ExecRequest::Run(step)).await.map_err(loop_gone)?;
            }
            Ok(())
        })
    }

    fn terminate_all(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            tx.send(ExecRequest::TerminateAll).await.map_err(loop_gone)?;
            Ok(())
        })
    }
}
