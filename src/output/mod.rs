// src/output/mod.rs

//! Ordered presentation of step progress.
//!
//! Steps run concurrently, but the user reads their progress as if they had
//! run one after another in declaration order.
//!
//! - [`event`] defines the unordered lifecycle events coming from the
//!   runtime and the ordered progress events going to a sink.
//! - [`coordinator`] is the pure state machine that turns one into the other.
//! - [`sink`] contains the `ProgressSink` trait and the terminal renderer.
//! - [`task`] runs a coordinator as the single consumer of an mpsc channel.

pub mod coordinator;
pub mod event;
pub mod sink;
pub mod task;

pub use coordinator::OutputCoordinator;
pub use event::{ProgressEvent, StepEvent};
pub use sink::{ProgressSink, TerminalSink};
pub use task::{OutputTask, spawn_output_task};
