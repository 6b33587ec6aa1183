// src/action/builtin.rs

//! Registry of runnables implemented in-process instead of as shell commands.
//!
//! Actions refer to them with `builtin = "<name>"`. The registry is handed to
//! the executor backend; a config that names an unregistered builtin is
//! rejected before anything runs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::engine::StepOutcome;
use crate::exec::OutputHandle;

/// Everything a builtin gets to see while it runs.
pub struct BuiltinContext<'a> {
    pub step: &'a str,
    pub workdir: &'a Path,
    pub env: &'a BTreeMap<String, String>,
    /// Emits output lines for the step, in order.
    pub output: &'a OutputHandle,
    /// Fires when the run is cancelled; builtins should return
    /// [`StepOutcome::Terminated`] promptly once it does.
    pub cancel: CancellationToken,
}

pub type BuiltinFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<StepOutcome>> + Send + 'a>>;

/// An externally registered runnable.
pub trait Builtin: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, ctx: BuiltinContext<'a>) -> BuiltinFuture<'a>;
}

#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Arc<dyn Builtin>>,
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builtin: Arc<dyn Builtin>) {
        self.builtins.insert(builtin.name().to_string(), builtin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Builtin>> {
        self.builtins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builtins.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
