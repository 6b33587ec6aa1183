// src/exec/mod.rs

//! Runnable execution layer.
//!
//! This module is responsible for actually running the resolved runnables
//! of scheduled steps, shell commands through `tokio::process::Command` and
//! builtins through the [`BuiltinRegistry`](crate::action::BuiltinRegistry),
//! and reporting back to the runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop which manages running steps.
//! - [`step_runner`] handles the execution of a single step.
//! - [`output_handle`] lets runners emit output lines for their step.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::action::BuiltinRegistry;

pub mod backend;
pub mod executor_loop;
pub mod output_handle;
pub mod step_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::{ExecRequest, spawn_executor};
pub use output_handle::OutputHandle;

/// Settings shared by every runner of a stage.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    /// Directory commands run in.
    pub workdir: PathBuf,
    pub builtins: Arc<BuiltinRegistry>,
}

impl ExecSettings {
    pub fn new(workdir: impl Into<PathBuf>, builtins: Arc<BuiltinRegistry>) -> Self {
        Self {
            workdir: workdir.into(),
            builtins,
        }
    }
}
