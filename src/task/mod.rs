//! Pending operations.

use crate::errors::{NationBuilderError, NationBuilderResult};
use crate::transport::HttpRequest;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Fails unless called from within a Tokio runtime.
pub(crate) fn ensure_runtime() -> NationBuilderResult<()> {
    tokio::runtime::Handle::try_current().map(|_| ()).map_err(|e| {
        NationBuilderError::configuration("Requests must be issued from within a Tokio runtime")
            .with_cause(e)
    })
}

#[derive(Debug, Default)]
struct TaskState {
    cancelled: AtomicBool,
    finished: AtomicBool,
}

/// Handle to a dispatched (or not yet started) request.
///
/// Cancelling guarantees the completion never fires. Dropping a handle that was
/// never started cancels it; dropping a started handle lets the request run on.
#[derive(Debug)]
pub struct TaskHandle {
    id: Uuid,
    request: HttpRequest,
    state: Arc<TaskState>,
    start: Mutex<Option<oneshot::Sender<()>>>,
    abort: AbortHandle,
}

impl TaskHandle {
    /// Spawns `work` on the current Tokio runtime and returns its handle.
    ///
    /// `deliver` receives the outcome unless the work yields `None` or the task was
    /// cancelled first.
    pub(crate) fn spawn<T, W, D>(request: HttpRequest, auto_start: bool, work: W, deliver: D) -> Self
    where
        T: Send + 'static,
        W: Future<Output = Option<T>> + Send + 'static,
        D: FnOnce(T) + Send + 'static,
    {
        let state = Arc::new(TaskState::default());
        let (start_tx, start_rx) = oneshot::channel::<()>();

        let task_state = Arc::clone(&state);
        let join = tokio::spawn(async move {
            if start_rx.await.is_err() {
                return;
            }
            let outcome = work.await;
            if task_state.cancelled.load(Ordering::SeqCst) {
                return;
            }
            task_state.finished.store(true, Ordering::SeqCst);
            if let Some(outcome) = outcome {
                deliver(outcome);
            }
        });

        let handle = Self {
            id: Uuid::new_v4(),
            request,
            state,
            start: Mutex::new(Some(start_tx)),
            abort: join.abort_handle(),
        };
        if auto_start {
            handle.start();
        }
        handle
    }

    /// Gets the task identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Gets the request this task dispatches, after hooks ran.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Starts an idle task. Returns false if it was already started or cancelled.
    pub fn start(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let sender = self.start.lock().ok().and_then(|mut s| s.take());
        match sender {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    /// Returns true once the task was started.
    pub fn is_started(&self) -> bool {
        self.start.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// Cancels the task. The completion will not be invoked afterwards.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut sender) = self.start.lock() {
            sender.take();
        }
        self.abort.abort();
    }

    /// Returns true if the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Returns true if the task ran to completion without being cancelled.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if !self.is_started() {
            self.cancel();
        }
    }
}
