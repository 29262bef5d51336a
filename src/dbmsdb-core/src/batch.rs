//! Batch queue, batch executor and the commit coordinator.
//!
//! Operations executed through a [`BatchExecutor`] are queued together with
//! a [`BatchJob`] and sent as one composite request on commit. The composite
//! response is matched to the queue by position and every job is resolved
//! through the same handler a direct call would use.

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{self, SubResponse};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::{ApiExecutor, ExecutionContext, Operation};
use crate::job::{BatchJob, QueuedJob, Resolve};
use crate::request::{Method, Request};
use crate::response::Response;
use crate::transport::Transport;

struct QueuedOperation {
    request: Request,
    job: Arc<dyn Resolve>,
}

/// Ordered operations waiting for a commit
#[derive(Default)]
pub struct BatchQueue {
    entries: Vec<QueuedOperation>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an operation and hand out the job for its outcome
    pub fn enqueue<T: Send + 'static>(&mut self, operation: Operation<T>) -> BatchJob<T> {
        let (request, handler) = operation.into_parts();
        let job = BatchJob::new(
            Uuid::new_v4().simple().to_string(),
            self.entries.len(),
            handler,
        );
        self.entries.push(QueuedOperation {
            request,
            job: job.erased(),
        });
        job
    }

    /// Queued requests, in commit order
    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.entries.iter().map(|entry| &entry.request)
    }
}

impl fmt::Debug for BatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchQueue")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Send every queued operation as one composite request and resolve the
/// jobs in queue order.
///
/// Per-operation failures are stored on their jobs. Only a failure of the
/// composite call itself (transport, error envelope, malformed response) is
/// returned, after every job has been resolved to that same error.
pub async fn commit_queue(transport: &dyn Transport, queue: BatchQueue) -> Result<()> {
    let entries = queue.entries;
    if entries.is_empty() {
        debug!("Empty batch, nothing to send");
        return Ok(());
    }

    let started = Instant::now();
    let boundary = codec::new_boundary();
    let body = codec::encode_batch(
        &boundary,
        entries
            .iter()
            .map(|entry| (entry.job.id(), &entry.request)),
    );
    let request = Request::new(Method::Post, codec::BATCH_ENDPOINT)
        .with_header("content-type", codec::content_type(&boundary))
        .with_text(body);

    debug!(jobs = entries.len(), boundary = %boundary, "Sending batch");

    let response = match transport.send_request(&request).await {
        Ok(response) => response,
        Err(err) => return Err(fail_all(&entries, err)),
    };
    if !response.is_success {
        let err = Error::server(ErrorKind::BatchExecute, &response);
        return Err(fail_all(&entries, err));
    }

    let response_boundary = response
        .header("content-type")
        .and_then(codec::boundary_from_content_type)
        .unwrap_or(boundary.as_str());

    // Check the whole response before touching any job
    let parts = match codec::decode_batch(response_boundary, &response.raw_body)
        .and_then(|parts| check_alignment(&entries, parts))
    {
        Ok(parts) => parts,
        Err(err) => return Err(fail_all(&entries, err)),
    };

    for (entry, part) in entries.iter().zip(parts) {
        let url = format!("{}{}", transport.url_prefix(), entry.request.path_and_query());
        let sub_response = Response::new(
            entry.request.method,
            url,
            part.headers,
            part.status_code,
            part.status_text,
            part.body,
        )
        .prepare();
        entry.job.resolve(sub_response);
    }

    info!(
        db = transport.db_name(),
        jobs = entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Committed batch"
    );
    Ok(())
}

fn check_alignment(entries: &[QueuedOperation], parts: Vec<SubResponse>) -> Result<Vec<SubResponse>> {
    if parts.len() != entries.len() {
        return Err(Error::BatchIntegrity(format!(
            "expected {} parts in batch response, got {}",
            entries.len(),
            parts.len()
        )));
    }

    for (entry, part) in entries.iter().zip(&parts) {
        if let Some(content_id) = &part.content_id {
            if content_id != entry.job.id() {
                return Err(Error::BatchIntegrity(format!(
                    "part {} answers {} instead of job {}",
                    entry.job.position(),
                    content_id,
                    entry.job.id()
                )));
            }
        }
    }

    Ok(parts)
}

fn fail_all(entries: &[QueuedOperation], err: Error) -> Error {
    warn!(jobs = entries.len(), error = %err, "Batch commit failed");
    for entry in entries {
        entry.job.fail(err.clone());
    }
    err
}

struct BatchSession {
    queue: BatchQueue,
    jobs: Vec<Arc<dyn Resolve>>,
    committed: bool,
}

/// Queues operations instead of sending them.
///
/// Clones share one session, so wrappers created from the same batch
/// context all append to the same queue.
///
/// Not meant for concurrent use. Enqueue from one task at a time: calls
/// racing from several tasks land in the queue in no defined order.
#[derive(Clone)]
pub struct BatchExecutor {
    transport: Arc<dyn Transport>,
    return_result: bool,
    session: Arc<Mutex<BatchSession>>,
}

impl BatchExecutor {
    pub fn new(transport: Arc<dyn Transport>, return_result: bool) -> Self {
        Self {
            transport,
            return_result,
            session: Arc::new(Mutex::new(BatchSession {
                queue: BatchQueue::new(),
                jobs: Vec::new(),
                committed: false,
            })),
        }
    }

    /// Whether operations hand back jobs
    pub fn return_result(&self) -> bool {
        self.return_result
    }

    pub fn is_committed(&self) -> bool {
        self.session.lock().committed
    }

    /// Number of operations waiting for the commit
    pub fn len(&self) -> usize {
        self.session.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.lock().queue.is_empty()
    }

    /// Every job created by this executor, `None` when results are not returned
    pub fn queued_jobs(&self) -> Option<Vec<QueuedJob>> {
        if !self.return_result {
            return None;
        }
        let session = self.session.lock();
        Some(session.jobs.iter().cloned().map(QueuedJob::new).collect())
    }

    pub fn enqueue<T: Send + 'static>(&self, operation: Operation<T>) -> Result<Option<BatchJob<T>>> {
        let mut session = self.session.lock();
        if session.committed {
            return Err(Error::BatchState("batch already committed".to_string()));
        }

        let method = operation.request().method;
        let endpoint = operation.request().endpoint.clone();
        let job = session.queue.enqueue(operation);
        session.jobs.push(job.erased());

        debug!(
            position = job.position(),
            job = job.id(),
            method = %method,
            endpoint = %endpoint,
            "Queued batch operation"
        );

        Ok(self.return_result.then_some(job))
    }

    /// Send the queue as one composite request. Callable once.
    pub async fn commit(&self) -> Result<()> {
        let queue = {
            let mut session = self.session.lock();
            if session.committed {
                return Err(Error::BatchState("batch already committed".to_string()));
            }
            session.committed = true;
            std::mem::take(&mut session.queue)
        };

        commit_queue(self.transport.as_ref(), queue).await
    }
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session.lock();
        f.debug_struct("BatchExecutor")
            .field("db", &self.transport.db_name())
            .field("return_result", &self.return_result)
            .field("queued", &session.queue.len())
            .field("committed", &session.committed)
            .finish()
    }
}

impl ApiExecutor for BatchExecutor {
    type Output<T: Send + 'static> = Option<BatchJob<T>>;

    fn context(&self) -> ExecutionContext {
        ExecutionContext::Batch
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn execute<T: Send + 'static>(
        &self,
        operation: Operation<T>,
    ) -> impl Future<Output = Result<Self::Output<T>>> + Send {
        std::future::ready(self.enqueue(operation))
    }
}
