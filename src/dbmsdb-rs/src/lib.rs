//! DbmsDB Client Library
//!
//! HTTP driver for DbmsDB servers. Every API wrapper is generic over an
//! [`ApiExecutor`]: the default executor sends each call immediately, the
//! batch executor queues calls and sends them together on commit.
//!
//! ```rust,no_run
//! use dbmsdb::{Client, ClientConfig, InsertOptions, QueryOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> dbmsdb::Result<()> {
//!     let client = Client::new(ClientConfig::default())?;
//!     let db = client.db("school", "root", "passwd");
//!
//!     let batch = db.begin_batch_execution(true);
//!     let students = batch.relation("students");
//!     let kris = students.insert(json!({"_key": "Kris"}), InsertOptions::default()).await?;
//!     let query = batch.sql().execute("RETURN 1", QueryOptions::default()).await?;
//!     batch.commit().await?;
//!
//!     if let (Some(kris), Some(query)) = (kris, query) {
//!         println!("{}", kris.result()?["_key"]);
//!         println!("{:?}", query.result()?.batch());
//!     }
//!     Ok(())
//! }
//! ```

mod batch;
mod client;
mod connection;
mod cursor;
mod database;
mod relation;
mod sql;

pub use batch::BatchDatabase;
pub use client::Client;
pub use connection::HttpConnection;
pub use cursor::Cursor;
pub use database::{Database, StandardDatabase};
pub use relation::{
    DeleteOptions, DocumentRef, InsertOptions, ReadOptions, Relation, ReplaceOptions,
    UpdateOptions,
};
pub use sql::{ExplainOptions, QueryOptions, Sql};

pub use dbmsdb_core::{
    errno, ApiExecutor, BatchExecutor, BatchJob, ClientConfig, DefaultExecutor, Error, ErrorKind,
    ExecutionContext, JobStatus, QueuedJob, Request, Response, Result, ServerError, Transport,
};
