use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::executor::ResponseHandler;
use crate::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared slot behind a job handle. Written once, by the commit.
struct JobCell<T> {
    id: String,
    position: usize,
    handler: Mutex<Option<ResponseHandler<T>>>,
    outcome: Mutex<Option<Result<T>>>,
}

/// Type-erased access the batch queue needs to resolve jobs of any type
pub(crate) trait Resolve: Send + Sync {
    fn id(&self) -> &str;
    fn position(&self) -> usize;
    fn status(&self) -> JobStatus;
    /// Run the response handler and store its outcome
    fn resolve(&self, response: Response);
    /// Store an error without running the handler
    fn fail(&self, error: Error);
}

impl<T: Send + 'static> JobCell<T> {
    fn settle(&self, outcome: Result<T>) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
    }
}

impl<T: Send + 'static> Resolve for JobCell<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn status(&self) -> JobStatus {
        if self.outcome.lock().is_some() {
            JobStatus::Done
        } else {
            JobStatus::Pending
        }
    }

    fn resolve(&self, response: Response) {
        // Taking the handler makes a second resolution a no-op
        let Some(handler) = self.handler.lock().take() else {
            return;
        };
        self.settle(handler(response));
    }

    fn fail(&self, error: Error) {
        self.handler.lock().take();
        self.settle(Err(error));
    }
}

/// Handle to the deferred outcome of one batched operation.
///
/// Stays `Pending` until the batch is committed, then holds either the
/// handler's value or the error the server reported for this operation.
pub struct BatchJob<T> {
    cell: Arc<JobCell<T>>,
}

impl<T: Send + 'static> BatchJob<T> {
    pub(crate) fn new(id: String, position: usize, handler: ResponseHandler<T>) -> Self {
        Self {
            cell: Arc::new(JobCell {
                id,
                position,
                handler: Mutex::new(Some(handler)),
                outcome: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn erased(&self) -> Arc<dyn Resolve> {
        self.cell.clone()
    }

    /// Identifier sent as the part's `Content-Id`
    pub fn id(&self) -> &str {
        &self.cell.id
    }

    /// Slot in the batch queue
    pub fn position(&self) -> usize {
        self.cell.position
    }

    pub fn status(&self) -> JobStatus {
        Resolve::status(self.cell.as_ref())
    }

    /// Outcome of the operation.
    ///
    /// Fails with [`Error::JobResultUnavailable`] until the batch is
    /// committed; afterwards returns the value or the captured error.
    pub fn result(&self) -> Result<T>
    where
        T: Clone,
    {
        match self.cell.outcome.lock().as_ref() {
            Some(outcome) => outcome.clone(),
            None => Err(Error::JobResultUnavailable(
                "result not available yet".to_string(),
            )),
        }
    }

    /// Move the outcome out of the job, for values that are not `Clone`.
    ///
    /// The job stays `Done`; later reads fail with
    /// [`Error::JobResultUnavailable`].
    pub fn take_result(&self) -> Result<T> {
        let mut slot = self.cell.outcome.lock();
        match slot.take() {
            Some(outcome) => {
                *slot = Some(Err(Error::JobResultUnavailable(
                    "result already taken".to_string(),
                )));
                outcome
            }
            None => Err(Error::JobResultUnavailable(
                "result not available yet".to_string(),
            )),
        }
    }
}

impl<T> Clone for BatchJob<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for BatchJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchJob")
            .field("id", &self.id())
            .field("position", &self.position())
            .field("status", &self.status())
            .finish()
    }
}

/// Result-type-independent view of a queued job
#[derive(Clone)]
pub struct QueuedJob {
    inner: Arc<dyn Resolve>,
}

impl QueuedJob {
    pub(crate) fn new(inner: Arc<dyn Resolve>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn position(&self) -> usize {
        self.inner.position()
    }

    pub fn status(&self) -> JobStatus {
        self.inner.status()
    }
}

impl fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id())
            .field("position", &self.position())
            .field("status", &self.status())
            .finish()
    }
}
