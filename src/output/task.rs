// src/output/task.rs

//! The coordinator as the single consumer of lifecycle events.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::output::coordinator::OutputCoordinator;
use crate::output::event::StepEvent;
use crate::output::sink::ProgressSink;

/// Handle to a running output task.
pub struct OutputTask<S: ProgressSink + 'static> {
    pub tx: mpsc::Sender<StepEvent>,
    pub handle: JoinHandle<S>,
}

/// Spawn the presentation task for one stage.
///
/// It owns the coordinator and the sink; nothing else touches either. When
/// every sender is dropped it flushes whatever is still held back and hands
/// the sink back through the join handle.
pub fn spawn_output_task<S>(coordinator: OutputCoordinator, mut sink: S) -> OutputTask<S>
where
    S: ProgressSink + 'static,
{
    let (tx, mut rx) = mpsc::channel::<StepEvent>(256);

    let handle = tokio::spawn(async move {
        let mut coordinator = coordinator;

        while let Some(event) = rx.recv().await {
            for shown in coordinator.handle(event) {
                sink.event(&shown);
            }
        }

        let leftovers = coordinator.finish();
        if !leftovers.is_empty() {
            debug!(count = leftovers.len(), "flushing held-back progress at end of stage");
        }
        for shown in leftovers {
            sink.event(&shown);
        }

        sink
    });

    OutputTask { tx, handle }
}
