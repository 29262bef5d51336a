use dbmsdb_core::request::Method;
use dbmsdb_core::{
    errno, ApiExecutor, BatchExecutor, DefaultExecutor, Error, ErrorKind, ExecutionContext,
    Operation, Request, Result, Transport,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::batch::BatchDatabase;
use crate::relation::{strip_envelope, Relation};
use crate::sql::Sql;

/// Database handle.
///
/// With the default executor every call goes to the server immediately.
/// A [`BatchDatabase`] has the same surface but queues its calls.
#[derive(Clone)]
pub struct Database<E: ApiExecutor> {
    pub(crate) executor: E,
}

/// Database whose calls are sent immediately
pub type StandardDatabase = Database<DefaultExecutor>;

impl<E: ApiExecutor> Database<E> {
    pub(crate) fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    pub fn name(&self) -> &str {
        self.executor.transport().db_name()
    }

    /// "default" for direct calls, "batch" inside a batch context
    pub fn context(&self) -> ExecutionContext {
        self.executor.context()
    }

    pub fn relation(&self, name: impl Into<String>) -> Relation<E> {
        Relation::new(self.executor.clone(), name)
    }

    pub fn sql(&self) -> Sql<E> {
        Sql::new(self.executor.clone())
    }

    /// Server version string
    pub async fn version(&self) -> Result<E::Output<String>> {
        let request = Request::new(Method::Get, "/_api/version");
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::ServerVersion, &resp));
            }
            Ok(resp.body["version"].as_str().unwrap_or_default().to_string())
        });
        self.executor.execute(operation).await
    }

    /// Descriptions of every relation in the database
    pub async fn relations(&self) -> Result<E::Output<Vec<Value>>> {
        let operation = Operation::new(list_relations_request(), |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::RelationList, &resp));
            }
            Ok(relation_list(&resp.body))
        });
        self.executor.execute(operation).await
    }

    pub async fn has_relation(&self, name: &str) -> Result<E::Output<bool>> {
        let name = name.to_string();
        let operation = Operation::new(list_relations_request(), move |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::RelationList, &resp));
            }
            Ok(relation_list(&resp.body)
                .iter()
                .any(|relation| relation["name"].as_str() == Some(name.as_str())))
        });
        self.executor.execute(operation).await
    }

    /// Create a relation and return its properties
    pub async fn create_relation(
        &self,
        name: &str,
        sync: Option<bool>,
    ) -> Result<E::Output<Value>> {
        let mut data = json!({ "name": name });
        if let Some(sync) = sync {
            data["waitForSync"] = json!(sync);
        }
        let request = Request::new(Method::Post, "/_api/relation").with_json(data);
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::RelationCreate, &resp));
            }
            Ok(strip_envelope(resp.body))
        });
        self.executor.execute(operation).await
    }

    /// Drop a relation. With `ignore_missing`, a missing relation yields `false`.
    pub async fn delete_relation(
        &self,
        name: &str,
        ignore_missing: bool,
    ) -> Result<E::Output<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/relation/{}", name));
        let operation = Operation::new(request, move |resp| {
            if resp.error_code == Some(errno::DATA_SOURCE_NOT_FOUND) && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success {
                return Err(Error::server(ErrorKind::RelationDelete, &resp));
            }
            Ok(true)
        });
        self.executor.execute(operation).await
    }
}

fn list_relations_request() -> Request {
    Request::new(Method::Get, "/_api/relation")
}

fn relation_list(body: &Value) -> Vec<Value> {
    body["result"].as_array().cloned().unwrap_or_default()
}

impl Database<DefaultExecutor> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_executor(DefaultExecutor::new(transport))
    }

    /// Open a batch context over the same connection.
    ///
    /// Calls made through the returned handle are queued until
    /// [`BatchDatabase::commit`]. With `return_result` false they yield
    /// `None` instead of a job.
    pub fn begin_batch_execution(&self, return_result: bool) -> BatchDatabase {
        let transport = Arc::clone(self.executor.transport());
        Database::with_executor(BatchExecutor::new(transport, return_result))
    }

    /// Run `scope` inside a batch context and commit when it returns.
    ///
    /// The commit happens whether `scope` succeeds or fails, unless `scope`
    /// committed already. A failure of `scope` takes precedence over a
    /// failure of the commit.
    pub async fn batch<F, Fut, R>(&self, return_result: bool, scope: F) -> Result<R>
    where
        F: FnOnce(BatchDatabase) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let batch = self.begin_batch_execution(return_result);
        let outcome = scope(batch.clone()).await;

        let committed = if batch.is_committed() {
            Ok(())
        } else {
            batch.commit().await
        };

        match (outcome, committed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(commit_err)) => {
                warn!(error = %commit_err, "Batch commit failed after the batch scope failed");
                Err(err)
            }
        }
    }
}
