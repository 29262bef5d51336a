use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;

/// Turns a raw response into a domain value or a domain error
pub type ResponseHandler<T> = Box<dyn FnOnce(Response) -> Result<T> + Send>;

/// A request together with the handler that interprets its response.
///
/// API wrappers build one of these per call and hand it to whichever
/// executor they were created with.
pub struct Operation<T> {
    request: Request,
    handler: ResponseHandler<T>,
}

impl<T> Operation<T> {
    pub fn new<F>(request: Request, handler: F) -> Self
    where
        F: FnOnce(Response) -> Result<T> + Send + 'static,
    {
        Self {
            request,
            handler: Box::new(handler),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_parts(self) -> (Request, ResponseHandler<T>) {
        (self.request, self.handler)
    }

    /// Apply the response handler
    pub fn handle(self, response: Response) -> Result<T> {
        (self.handler)(response)
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Default,
    Batch,
}

impl ExecutionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionContext::Default => "default",
            ExecutionContext::Batch => "batch",
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides what happens to an operation: send it now, or queue it.
///
/// `Output<T>` is what API wrappers hand back to the caller, the value
/// itself for [`DefaultExecutor`] and a job handle for the batch executor.
pub trait ApiExecutor: Clone + Send + Sync + 'static {
    type Output<T: Send + 'static>: Send;

    fn context(&self) -> ExecutionContext;

    fn transport(&self) -> &Arc<dyn Transport>;

    fn execute<T: Send + 'static>(
        &self,
        operation: Operation<T>,
    ) -> impl Future<Output = Result<Self::Output<T>>> + Send;
}

/// Sends every operation immediately and returns its result
#[derive(Clone)]
pub struct DefaultExecutor {
    transport: Arc<dyn Transport>,
}

impl DefaultExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl ApiExecutor for DefaultExecutor {
    type Output<T: Send + 'static> = T;

    fn context(&self) -> ExecutionContext {
        ExecutionContext::Default
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn execute<T: Send + 'static>(
        &self,
        operation: Operation<T>,
    ) -> impl Future<Output = Result<Self::Output<T>>> + Send {
        let transport = Arc::clone(&self.transport);
        async move {
            let (request, handler) = operation.into_parts();
            let response = transport.send_request(&request).await?;
            handler(response)
        }
    }
}
