//! DbmsDB Core Library
//!
//! Transport-independent pieces of the DbmsDB driver:
//! - Request descriptors and prepared responses
//! - The error taxonomy shared by every API wrapper
//! - The operation executor seam (immediate vs. batched)
//! - Batch jobs, the batch queue and the commit coordinator
//! - The multipart codec used by the `/_api/batch` endpoint
//! - Client configuration

pub mod batch;
pub mod codec;
pub mod config;
pub mod errno;
pub mod error;
pub mod executor;
pub mod job;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use batch::{BatchExecutor, BatchQueue};
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result, ServerError};
pub use executor::{ApiExecutor, DefaultExecutor, ExecutionContext, Operation};
pub use job::{BatchJob, JobStatus, QueuedJob};
pub use request::{Body, Headers, Method, Params, Request};
pub use response::Response;
pub use transport::Transport;
