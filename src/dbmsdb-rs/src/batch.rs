use dbmsdb_core::{BatchExecutor, QueuedJob, Result};

use crate::database::Database;

/// Database handle whose calls are queued and sent as one request.
///
/// Wrapped calls return `Option<BatchJob<T>>` (`None` when the context was
/// opened without `return_result`). Nothing is sent before
/// [`commit`](Database::commit); afterwards the context rejects new calls.
///
/// Not meant for concurrent use: issue calls from one task at a time, since
/// calls racing from several tasks are queued in no defined order.
pub type BatchDatabase = Database<BatchExecutor>;

impl Database<BatchExecutor> {
    /// Send every queued call and resolve their jobs. Callable once.
    pub async fn commit(&self) -> Result<()> {
        self.executor.commit().await
    }

    /// Jobs created through this context, `None` without `return_result`
    pub fn queued_jobs(&self) -> Option<Vec<QueuedJob>> {
        self.executor.queued_jobs()
    }

    pub fn is_committed(&self) -> bool {
        self.executor.is_committed()
    }

    pub fn return_result(&self) -> bool {
        self.executor.return_result()
    }

    /// Calls waiting for the commit
    pub fn len(&self) -> usize {
        self.executor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executor.is_empty()
    }
}
