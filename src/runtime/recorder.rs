//! Detached completion of run records
//!
//! Once the entry point returns or throws, the run record is closed and saved
//! on a blocking task that nobody awaits. Delivery is at most once: a failed
//! save is logged and dropped, and a crash before the task runs loses the
//! entry.

use std::sync::Arc;
use tokio::runtime::Handle;

use super::error::PersistenceError;
use super::function::ExecHistory;
use super::ids::ObjectId;
use super::ports::{HistoryStore, StoreHandle};

/// Hands finished runs to the history store in the background.
#[derive(Clone)]
pub struct CompletionRecorder {
    history: Arc<dyn HistoryStore>,
    runner: Handle,
}

impl CompletionRecorder {
    /// Create a recorder that spawns onto `runner`
    pub fn new(history: Arc<dyn HistoryStore>, runner: Handle) -> Self {
        Self { history, runner }
    }

    /// Close `run` with the invocation outcome and persist it without waiting.
    pub fn complete(
        &self,
        store: StoreHandle,
        function_id: ObjectId,
        run: ExecHistory,
        error: Option<String>,
    ) {
        let history = Arc::clone(&self.history);
        // Dropping the JoinHandle detaches the task.
        let _ = self.runner.spawn_blocking(move || {
            let _ = record(history.as_ref(), &store, &function_id, run, error.as_deref());
        });
    }
}

/// Close and save a run synchronously. Failures are logged before returning.
pub fn record(
    history: &dyn HistoryStore,
    store: &StoreHandle,
    function_id: &ObjectId,
    mut run: ExecHistory,
    error: Option<&str>,
) -> Result<(), PersistenceError> {
    run.finish(error);
    let run_id = run.id.clone();
    let success = run.success;

    history
        .record_run(store, function_id, run)
        .inspect(|_| {
            tracing::debug!(function = %function_id, run = %run_id, success, "run recorded");
        })
        .inspect_err(|err| {
            tracing::error!(
                function = %function_id,
                run = %run_id,
                error = %err,
                "error logging function complete"
            );
        })
}
