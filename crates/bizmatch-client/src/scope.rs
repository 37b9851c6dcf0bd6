//! Owner-bound background tasks.

use std::future::Future;
use std::sync::Mutex;

use tokio::task::AbortHandle;

/// Tasks spawned through a scope are aborted when the scope is dropped, so
/// no result is delivered to an owner that no longer exists.
#[derive(Default)]
pub struct TaskScope {
    tasks: Mutex<Vec<AbortHandle>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future).abort_handle();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    pub fn active(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub fn cancel(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel();
    }
}
