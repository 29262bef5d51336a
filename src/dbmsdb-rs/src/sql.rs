use dbmsdb_core::request::Method;
use dbmsdb_core::{ApiExecutor, Error, ErrorKind, Operation, Request, Result};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::cursor::Cursor;
use crate::relation::strip_envelope;

/// Options for [`Sql::execute`]. Unset fields are left to the server.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Include the total result count in the cursor
    pub count: bool,
    pub batch_size: Option<u64>,
    /// Seconds the server keeps the cursor alive
    pub ttl: Option<f64>,
    pub bind_vars: Option<Map<String, Value>>,
    pub cache: Option<bool>,
    /// Bytes; 0 means no limit
    pub memory_limit: u64,
    pub full_count: Option<bool>,
    pub fill_block_cache: Option<bool>,
    pub max_plans: Option<u64>,
    pub optimizer_rules: Option<Vec<String>>,
    pub fail_on_warning: Option<bool>,
    pub profile: Option<bool>,
    pub max_warning_count: Option<u64>,
    pub stream: Option<bool>,
    /// Seconds; 0.0 means no limit
    pub max_runtime: Option<f64>,
}

impl QueryOptions {
    fn request_body(&self, query: &str) -> Value {
        let mut data = Map::new();
        data.insert("query".into(), json!(query));
        data.insert("count".into(), json!(self.count));
        if let Some(batch_size) = self.batch_size {
            data.insert("batchSize".into(), json!(batch_size));
        }
        if let Some(ttl) = self.ttl {
            data.insert("ttl".into(), json!(ttl));
        }
        if let Some(bind_vars) = &self.bind_vars {
            data.insert("bindVars".into(), Value::Object(bind_vars.clone()));
        }
        if let Some(cache) = self.cache {
            data.insert("cache".into(), json!(cache));
        }
        data.insert("memoryLimit".into(), json!(self.memory_limit));

        let mut options = Map::new();
        let mut set = |name: &str, value: Option<Value>| {
            if let Some(value) = value {
                options.insert(name.to_string(), value);
            }
        };
        set("fullCount", self.full_count.map(Value::from));
        set("fillBlockCache", self.fill_block_cache.map(Value::from));
        set("maxNumberOfPlans", self.max_plans.map(Value::from));
        set(
            "optimizer",
            self.optimizer_rules
                .as_ref()
                .map(|rules| json!({ "rules": rules })),
        );
        set("failOnWarning", self.fail_on_warning.map(Value::from));
        set("profile", self.profile.map(Value::from));
        set("maxWarningCount", self.max_warning_count.map(Value::from));
        set("stream", self.stream.map(Value::from));
        set("maxRuntime", self.max_runtime.map(Value::from));

        // Options go both under "options" and at the top level
        if !options.is_empty() {
            data.insert("options".into(), Value::Object(options.clone()));
            data.extend(options);
        }
        Value::Object(data)
    }
}

/// Options for [`Sql::explain`]
#[derive(Debug, Clone, Default)]
pub struct ExplainOptions {
    /// Return every plan instead of the optimal one
    pub all_plans: bool,
    pub max_plans: Option<u64>,
    pub optimizer_rules: Option<Vec<String>>,
    pub bind_vars: Option<Map<String, Value>>,
}

/// Query API wrapper
#[derive(Clone)]
pub struct Sql<E: ApiExecutor> {
    executor: E,
}

impl<E: ApiExecutor> Sql<E> {
    pub(crate) fn new(executor: E) -> Self {
        Self { executor }
    }

    pub(crate) fn execute_operation(&self, query: &str, options: &QueryOptions) -> Operation<Cursor> {
        let request = Request::new(Method::Post, "/_api/cursor").with_json(options.request_body(query));
        let transport = Arc::clone(self.executor.transport());

        Operation::new(request, move |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::SqlQueryExecute, &resp));
            }
            Cursor::from_body(transport, resp.body)
        })
    }

    /// Run a query and return its result cursor
    pub async fn execute(&self, query: &str, options: QueryOptions) -> Result<E::Output<Cursor>> {
        let operation = self.execute_operation(query, &options);
        self.executor.execute(operation).await
    }

    /// Parse a query without running it.
    ///
    /// Returns the parser output with `bindVars` renamed to `bind_vars`.
    pub async fn validate(&self, query: &str) -> Result<E::Output<Value>> {
        let request = Request::new(Method::Post, "/_api/query").with_json(json!({ "query": query }));
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::SqlQueryValidate, &resp));
            }
            let mut body = strip_envelope(resp.body);
            if let Some(map) = body.as_object_mut() {
                if let Some(bind_vars) = map.remove("bindVars") {
                    map.insert("bind_vars".to_string(), bind_vars);
                }
            }
            Ok(body)
        });
        self.executor.execute(operation).await
    }

    /// Execution plan of a query: one plan object, or an array of plans
    /// with `all_plans`
    pub async fn explain(&self, query: &str, options: ExplainOptions) -> Result<E::Output<Value>> {
        let mut plan_options = json!({ "allPlans": options.all_plans });
        if let Some(max_plans) = options.max_plans {
            plan_options["maxNumberOfPlans"] = json!(max_plans);
        }
        if let Some(rules) = options.optimizer_rules {
            plan_options["optimizer"] = json!({ "rules": rules });
        }

        let mut data = json!({ "query": query, "options": plan_options });
        if let Some(bind_vars) = options.bind_vars {
            data["bindVars"] = Value::Object(bind_vars);
        }

        let request = Request::new(Method::Post, "/_api/explain").with_json(data);
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::SqlQueryExplain, &resp));
            }
            let mut body = resp.body;
            match body.get_mut("plan") {
                Some(plan) => Ok(plan.take()),
                None => Ok(body.get_mut("plans").map(Value::take).unwrap_or_default()),
            }
        });
        self.executor.execute(operation).await
    }
}
