//! In-memory server state and the REST routes the driver uses.
//!
//! Routing is independent of actix so that direct HTTP calls and parts of
//! a composite batch request go through exactly the same code.

use dbmsdb_core::request::{Headers, Method, Params};
use dbmsdb_core::errno;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

use crate::query::{Query, QueryError};

const DEFAULT_BATCH_SIZE: usize = 1000;

/// One request as the store sees it
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    /// Path below `/_db/{name}`, e.g. `/_api/document/students/Kris`
    pub path: String,
    pub params: Params,
    /// Lowercased names
    pub headers: Headers,
    pub body: String,
}

impl Call {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Params::new(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.params.get(name).map(String::as_str) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => default,
        }
    }

    fn json_body(&self) -> Result<Value, MockResponse> {
        if self.body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&self.body).map_err(|err| {
            MockResponse::error(400, errno::HTTP_CORRUPTED_JSON, format!("invalid JSON body: {}", err))
        })
    }
}

/// Status and JSON body produced by the store
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: Value,
}

impl MockResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Successful response carrying the `error`/`code` envelope fields
    pub fn ok(status: u16, mut body: Value) -> Self {
        if let Some(map) = body.as_object_mut() {
            map.insert("error".to_string(), json!(false));
            map.insert("code".to_string(), json!(status));
        }
        Self { status, body }
    }

    pub fn error(status: u16, error_num: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({
                "error": true,
                "code": status,
                "errorNum": error_num,
                "errorMessage": message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

fn relation_not_found(name: &str) -> MockResponse {
    MockResponse::error(
        404,
        errno::DATA_SOURCE_NOT_FOUND,
        format!("collection or view not found: {}", name),
    )
}

fn document_not_found() -> MockResponse {
    MockResponse::error(404, errno::DOCUMENT_NOT_FOUND, "document not found")
}

fn revision_conflict(current: &Value) -> MockResponse {
    let mut resp = MockResponse::error(412, errno::CONFLICT, "conflict, _rev values do not match");
    for field in ["_id", "_key", "_rev"] {
        resp.body[field] = current[field].clone();
    }
    resp
}

fn query_error(err: QueryError) -> MockResponse {
    MockResponse::error(400, err.errno(), err.to_string())
}

#[derive(Debug)]
struct RelationData {
    id: u64,
    wait_for_sync: bool,
    documents: BTreeMap<String, Value>,
    next_key: u64,
}

impl RelationData {
    fn info(&self, name: &str) -> Value {
        json!({
            "id": self.id.to_string(),
            "name": name,
            "type": 2,
            "status": 3,
            "system": name.starts_with('_'),
            "waitForSync": self.wait_for_sync,
        })
    }
}

#[derive(Debug)]
struct CursorData {
    pending: VecDeque<Value>,
    batch_size: usize,
    count: Option<usize>,
}

/// Relations, documents and open cursors of one database
#[derive(Debug, Default)]
pub struct DatabaseState {
    relations: BTreeMap<String, RelationData>,
    cursors: HashMap<String, CursorData>,
    next_id: u64,
    revision: u64,
}

/// Every database the mock has seen. Databases spring into existence on
/// first use.
#[derive(Debug, Default)]
pub struct Store {
    databases: HashMap<String, DatabaseState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, db: &str, call: &Call) -> MockResponse {
        let state = self.databases.entry(db.to_string()).or_default();
        let resp = state.route(call);
        debug!(db, method = %call.method, path = %call.path, status = resp.status, "Store call");
        resp
    }

    /// Number of documents in a relation, `None` if it does not exist
    pub fn document_count(&self, db: &str, relation: &str) -> Option<usize> {
        self.databases
            .get(db)?
            .relations
            .get(relation)
            .map(|data| data.documents.len())
    }

    /// Open server-side cursors of a database
    pub fn open_cursors(&self, db: &str) -> usize {
        self.databases.get(db).map_or(0, |state| state.cursors.len())
    }
}

impl DatabaseState {
    fn route(&mut self, call: &Call) -> MockResponse {
        let path = call.path.trim_end_matches('/');
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match (call.method, segments.as_slice()) {
            (Method::Get, ["_api", "version"]) => MockResponse::new(
                200,
                json!({"server": "dbms", "version": env!("CARGO_PKG_VERSION"), "license": "community"}),
            ),

            (Method::Get, ["_api", "relation"]) => self.list_relations(),
            (Method::Post, ["_api", "relation"]) => self.create_relation(call),
            (Method::Delete, ["_api", "relation", name]) => self.delete_relation(name),
            (Method::Get, ["_api", "relation", name, "properties"]) => self.relation_properties(name),
            (Method::Get, ["_api", "relation", name, "count"]) => self.relation_count(name),
            (Method::Put, ["_api", "relation", name, "truncate"]) => self.truncate_relation(name),

            (Method::Post, ["_api", "document", relation]) => self.insert_document(relation, call),
            (Method::Get, ["_api", "document", relation, key]) => self.get_document(relation, key, call),
            (Method::Head, ["_api", "document", relation, key]) => self.get_document(relation, key, call),
            (Method::Patch, ["_api", "document", relation, key]) => {
                self.write_document(relation, key, call, true)
            }
            (Method::Put, ["_api", "document", relation, key]) => {
                self.write_document(relation, key, call, false)
            }
            (Method::Delete, ["_api", "document", relation, key]) => {
                self.delete_document(relation, key, call)
            }

            (Method::Post, ["_api", "cursor"]) => self.create_cursor(call),
            (Method::Put, ["_api", "cursor", id]) => self.next_batch(id),
            (Method::Delete, ["_api", "cursor", id]) => self.delete_cursor(id),

            (Method::Post, ["_api", "query"]) => self.validate_query(call),
            (Method::Post, ["_api", "explain"]) => self.explain_query(call),

            _ => MockResponse::error(
                404,
                errno::HTTP_NOT_FOUND,
                format!("unknown path '{}'", call.path),
            ),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_rev(&mut self) -> String {
        self.revision += 1;
        format!("_r{:x}", self.revision)
    }

    fn list_relations(&self) -> MockResponse {
        let result: Vec<Value> = self
            .relations
            .iter()
            .map(|(name, data)| data.info(name))
            .collect();
        MockResponse::ok(200, json!({ "result": result }))
    }

    fn create_relation(&mut self, call: &Call) -> MockResponse {
        let body = match call.json_body() {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        let name = body["name"].as_str().unwrap_or_default().to_string();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return MockResponse::error(400, errno::ILLEGAL_NAME, "illegal name");
        }
        if self.relations.contains_key(&name) {
            return MockResponse::error(409, errno::DUPLICATE_NAME, "duplicate name");
        }

        let data = RelationData {
            id: self.next_id(),
            wait_for_sync: body["waitForSync"].as_bool().unwrap_or(false),
            documents: BTreeMap::new(),
            next_key: 0,
        };
        let info = data.info(&name);
        self.relations.insert(name, data);
        MockResponse::ok(200, info)
    }

    fn delete_relation(&mut self, name: &str) -> MockResponse {
        match self.relations.remove(name) {
            Some(data) => MockResponse::ok(200, json!({ "id": data.id.to_string() })),
            None => relation_not_found(name),
        }
    }

    fn relation_properties(&self, name: &str) -> MockResponse {
        let Some(data) = self.relations.get(name) else {
            return relation_not_found(name);
        };
        let mut info = data.info(name);
        info["keyOptions"] = json!({"type": "traditional", "allowUserKeys": true});
        MockResponse::ok(200, info)
    }

    fn relation_count(&self, name: &str) -> MockResponse {
        let Some(data) = self.relations.get(name) else {
            return relation_not_found(name);
        };
        let mut info = data.info(name);
        info["count"] = json!(data.documents.len());
        MockResponse::ok(200, info)
    }

    fn truncate_relation(&mut self, name: &str) -> MockResponse {
        let Some(data) = self.relations.get_mut(name) else {
            return relation_not_found(name);
        };
        data.documents.clear();
        MockResponse::ok(200, data.info(name))
    }

    fn insert_document(&mut self, relation: &str, call: &Call) -> MockResponse {
        let rev = self.next_rev();
        let Some(data) = self.relations.get_mut(relation) else {
            return relation_not_found(relation);
        };
        let body = match call.json_body() {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        let Value::Object(mut doc) = body else {
            return MockResponse::error(400, errno::DOCUMENT_TYPE_INVALID, "invalid document type");
        };

        let key = match doc.get("_key") {
            Some(Value::String(key)) if !key.is_empty() => key.clone(),
            Some(_) => return MockResponse::error(400, errno::DOCUMENT_KEY_BAD, "illegal document key"),
            None => {
                data.next_key += 1;
                data.next_key.to_string()
            }
        };

        let overwrite_mode = call.params.get("overwriteMode").map(String::as_str);
        let overwrite = call.flag("overwrite", false) || overwrite_mode.is_some();
        let old = data.documents.get(&key).cloned();
        if old.is_some() && !overwrite {
            return MockResponse::error(
                409,
                errno::UNIQUE_CONSTRAINT_VIOLATED,
                format!(
                    "unique constraint violated - in index primary of type primary over '_key'; conflicting key: {}",
                    key
                ),
            );
        }

        if let (Some(Value::Object(existing)), Some("update")) = (&old, overwrite_mode) {
            let mut merged = existing.clone();
            merge_patch(&mut merged, doc, true, call.flag("keepNull", true));
            doc = merged;
        }

        let id = format!("{}/{}", relation, key);
        doc.insert("_id".to_string(), json!(id));
        doc.insert("_key".to_string(), json!(key));
        doc.insert("_rev".to_string(), json!(rev));
        let new = Value::Object(doc);
        data.documents.insert(key.clone(), new.clone());

        let status = write_status(data.wait_for_sync || call.flag("waitForSync", false));
        if call.flag("silent", false) {
            return MockResponse::new(status, json!({}));
        }

        let mut meta = json!({"_id": id, "_key": key, "_rev": rev});
        if let Some(old) = old {
            meta["_oldRev"] = old["_rev"].clone();
            if call.flag("returnOld", false) {
                meta["old"] = old;
            }
        }
        if call.flag("returnNew", false) {
            meta["new"] = new;
        }
        MockResponse::new(status, meta)
    }

    fn get_document(&self, relation: &str, key: &str, call: &Call) -> MockResponse {
        let Some(data) = self.relations.get(relation) else {
            return relation_not_found(relation);
        };
        let Some(doc) = data.documents.get(key) else {
            return document_not_found();
        };
        if let Some(rev) = call.headers.get("if-match") {
            if doc["_rev"].as_str() != Some(rev.as_str()) {
                return revision_conflict(doc);
            }
        }
        if let Some(rev) = call.headers.get("if-none-match") {
            if doc["_rev"].as_str() == Some(rev.as_str()) {
                return MockResponse::new(304, Value::Null);
            }
        }
        MockResponse::new(200, doc.clone())
    }

    /// PATCH (`merge`) or PUT of an existing document
    fn write_document(&mut self, relation: &str, key: &str, call: &Call, merge: bool) -> MockResponse {
        let rev = self.next_rev();
        let Some(data) = self.relations.get_mut(relation) else {
            return relation_not_found(relation);
        };
        let body = match call.json_body() {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        let Value::Object(patch) = body else {
            return MockResponse::error(400, errno::DOCUMENT_TYPE_INVALID, "invalid document type");
        };
        let Some(old) = data.documents.get(key).cloned() else {
            return document_not_found();
        };

        let expected = call.headers.get("if-match").map(String::as_str).or_else(|| {
            if call.flag("ignoreRevs", true) {
                None
            } else {
                patch.get("_rev").and_then(Value::as_str)
            }
        });
        if let Some(expected) = expected {
            if old["_rev"].as_str() != Some(expected) {
                return revision_conflict(&old);
            }
        }

        let mut doc = if merge {
            let mut merged = old.as_object().cloned().unwrap_or_default();
            merge_patch(
                &mut merged,
                patch,
                call.flag("mergeObjects", true),
                call.flag("keepNull", true),
            );
            merged
        } else {
            patch
        };

        let id = format!("{}/{}", relation, key);
        doc.insert("_id".to_string(), json!(id));
        doc.insert("_key".to_string(), json!(key));
        doc.insert("_rev".to_string(), json!(rev));
        let new = Value::Object(doc);
        data.documents.insert(key.to_string(), new.clone());

        let status = write_status(data.wait_for_sync || call.flag("waitForSync", false));
        if call.flag("silent", false) {
            return MockResponse::new(status, json!({}));
        }

        let mut meta = json!({"_id": id, "_key": key, "_rev": rev, "_oldRev": old["_rev"].clone()});
        if call.flag("returnNew", false) {
            meta["new"] = new;
        }
        if call.flag("returnOld", false) {
            meta["old"] = old;
        }
        MockResponse::new(status, meta)
    }

    fn delete_document(&mut self, relation: &str, key: &str, call: &Call) -> MockResponse {
        let Some(data) = self.relations.get_mut(relation) else {
            return relation_not_found(relation);
        };
        let Some(old) = data.documents.get(key) else {
            return document_not_found();
        };
        if let Some(expected) = call.headers.get("if-match") {
            if old["_rev"].as_str() != Some(expected.as_str()) {
                return revision_conflict(old);
            }
        }

        let old = data.documents.remove(key).unwrap_or_default();
        let status = write_status(data.wait_for_sync || call.flag("waitForSync", false));
        if call.flag("silent", false) {
            return MockResponse::new(status, json!({}));
        }

        let mut meta = json!({"_id": old["_id"].clone(), "_key": key, "_rev": old["_rev"].clone()});
        if call.flag("returnOld", false) {
            meta["old"] = old;
        }
        MockResponse::new(status, meta)
    }

    fn run_query(&self, body: &Value) -> Result<(Vec<Value>, usize), MockResponse> {
        let text = body["query"].as_str().unwrap_or_default();
        let query = Query::parse(text).map_err(query_error)?;
        let bind_vars = body["bindVars"].as_object().cloned().unwrap_or_default();

        if let Some(value) = query.constant(&bind_vars) {
            return value.map(|value| (vec![value], 0)).map_err(query_error);
        }
        let mut items = Vec::new();
        for name in query.relations() {
            let data = self.relations.get(name).ok_or_else(|| relation_not_found(name))?;
            items.extend(data.documents.values().cloned());
        }
        let scanned = items.len();
        Ok((items, scanned))
    }

    fn create_cursor(&mut self, call: &Call) -> MockResponse {
        let body = match call.json_body() {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        let (items, scanned) = match self.run_query(&body) {
            Ok(result) => result,
            Err(resp) => return resp,
        };

        let batch_size = body["batchSize"]
            .as_u64()
            .map_or(DEFAULT_BATCH_SIZE, |size| size.max(1) as usize);
        let count = body["count"].as_bool().unwrap_or(false).then_some(items.len());

        let mut pending: VecDeque<Value> = items.into();
        let first: Vec<Value> = take_batch(&mut pending, batch_size);
        let has_more = !pending.is_empty();

        let mut resp = json!({
            "result": first,
            "hasMore": has_more,
            "cached": false,
            "extra": {
                "stats": {
                    "writesExecuted": 0,
                    "writesIgnored": 0,
                    "scannedFull": scanned,
                    "scannedIndex": 0,
                    "filtered": 0,
                    "executionTime": 0.0,
                },
                "warnings": [],
            },
        });
        if let Some(count) = count {
            resp["count"] = json!(count);
        }
        if has_more {
            let id = self.next_id().to_string();
            resp["id"] = json!(id);
            self.cursors.insert(
                id,
                CursorData {
                    pending,
                    batch_size,
                    count,
                },
            );
        }
        MockResponse::ok(201, resp)
    }

    fn next_batch(&mut self, id: &str) -> MockResponse {
        let Some(cursor) = self.cursors.get_mut(id) else {
            return MockResponse::error(404, errno::CURSOR_NOT_FOUND, "cursor not found");
        };
        let batch = take_batch(&mut cursor.pending, cursor.batch_size);
        let has_more = !cursor.pending.is_empty();

        let mut resp = json!({"id": id, "result": batch, "hasMore": has_more, "cached": false});
        if let Some(count) = cursor.count {
            resp["count"] = json!(count);
        }
        if !has_more {
            self.cursors.remove(id);
        }
        MockResponse::ok(200, resp)
    }

    fn delete_cursor(&mut self, id: &str) -> MockResponse {
        match self.cursors.remove(id) {
            Some(_) => MockResponse::ok(202, json!({ "id": id })),
            None => MockResponse::error(404, errno::CURSOR_NOT_FOUND, "cursor not found"),
        }
    }

    fn validate_query(&self, call: &Call) -> MockResponse {
        let body = match call.json_body() {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        match Query::parse(body["query"].as_str().unwrap_or_default()) {
            Ok(query) => MockResponse::ok(
                200,
                json!({
                    "parsed": true,
                    "collections": query.relations(),
                    "bindVars": query.bind_parameters(),
                    "ast": [{"type": "root", "subNodes": []}],
                }),
            ),
            Err(err) => query_error(err),
        }
    }

    fn explain_query(&self, call: &Call) -> MockResponse {
        let body = match call.json_body() {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        let query = match Query::parse(body["query"].as_str().unwrap_or_default()) {
            Ok(query) => query,
            Err(err) => return query_error(err),
        };

        let relations: Vec<Value> = query
            .relations()
            .into_iter()
            .map(|name| json!({"name": name, "type": "read"}))
            .collect();
        let estimated_items = query
            .relations()
            .into_iter()
            .filter_map(|name| self.relations.get(name))
            .map(|data| data.documents.len())
            .sum::<usize>()
            .max(1);
        let plan = json!({
            "nodes": [
                {"type": "SingletonNode", "id": 1, "dependencies": []},
                {"type": "ReturnNode", "id": 2, "dependencies": [1]},
            ],
            "rules": [],
            "collections": relations,
            "variables": [],
            "estimatedCost": estimated_items as f64 + 1.0,
            "estimatedNrItems": estimated_items,
        });

        if body["options"]["allPlans"].as_bool().unwrap_or(false) {
            MockResponse::ok(200, json!({"plans": [plan], "warnings": [], "stats": {"plansCreated": 1}}))
        } else {
            MockResponse::ok(
                200,
                json!({"plan": plan, "cacheable": true, "warnings": [], "stats": {"plansCreated": 1}}),
            )
        }
    }
}

fn write_status(wait_for_sync: bool) -> u16 {
    if wait_for_sync {
        201
    } else {
        202
    }
}

fn take_batch(pending: &mut VecDeque<Value>, size: usize) -> Vec<Value> {
    let size = size.min(pending.len());
    pending.drain(..size).collect()
}

/// Apply a patch to a document. System attributes in the patch are ignored.
fn merge_patch(target: &mut Map<String, Value>, patch: Map<String, Value>, merge_objects: bool, keep_null: bool) {
    for (name, value) in patch {
        if name.starts_with('_') {
            continue;
        }
        if value.is_null() && !keep_null {
            target.remove(&name);
            continue;
        }
        match (target.get_mut(&name), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) if merge_objects => {
                merge_patch(existing, nested, true, keep_null);
            }
            (_, value) => {
                target.insert(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: Method, path: &str, body: Value) -> Call {
        let mut call = Call::new(method, path);
        if !body.is_null() {
            call.body = body.to_string();
        }
        call
    }

    fn with_students() -> Store {
        let mut store = Store::new();
        let resp = store.handle("school", &call(Method::Post, "/_api/relation", json!({"name": "students"})));
        assert_eq!(resp.status, 200);
        store
    }

    #[test]
    fn test_insert_and_read() {
        let mut store = with_students();
        let resp = store.handle(
            "school",
            &call(Method::Post, "/_api/document/students", json!({"_key": "Kris", "age": 20})),
        );
        assert_eq!(resp.status, 202);
        assert_eq!(resp.body["_id"], json!("students/Kris"));

        let doc = store.handle("school", &call(Method::Get, "/_api/document/students/Kris", Value::Null));
        assert_eq!(doc.status, 200);
        assert_eq!(doc.body["age"], json!(20));
        assert_eq!(doc.body["_rev"], resp.body["_rev"]);
        assert_eq!(store.document_count("school", "students"), Some(1));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let mut store = with_students();
        let insert = call(Method::Post, "/_api/document/students", json!({"_key": "Kris"}));
        store.handle("school", &insert);

        let resp = store.handle("school", &insert);
        assert_eq!(resp.status, 409);
        assert_eq!(resp.body["errorNum"], json!(errno::UNIQUE_CONSTRAINT_VIOLATED));

        let mut overwrite = insert.clone();
        overwrite.params.insert("overwrite".to_string(), "1".to_string());
        let resp = store.handle("school", &overwrite);
        assert_eq!(resp.status, 202);
        assert!(resp.body["_oldRev"].is_string());
    }

    #[test]
    fn test_missing_relation_and_document() {
        let mut store = with_students();
        let resp = store.handle("school", &call(Method::Post, "/_api/document/courses", json!({})));
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body["errorNum"], json!(errno::DATA_SOURCE_NOT_FOUND));

        let resp = store.handle("school", &call(Method::Get, "/_api/document/students/Nobody", Value::Null));
        assert_eq!(resp.body["errorNum"], json!(errno::DOCUMENT_NOT_FOUND));

        let resp = store.handle("school", &call(Method::Get, "/_api/nothing", Value::Null));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_revision_checks() {
        let mut store = with_students();
        store.handle("school", &call(Method::Post, "/_api/document/students", json!({"_key": "Rita"})));

        let mut stale = call(Method::Patch, "/_api/document/students/Rita", json!({"_rev": "_stale", "age": 1}));
        stale.params.insert("ignoreRevs".to_string(), "0".to_string());
        let resp = store.handle("school", &stale);
        assert_eq!(resp.status, 412);
        assert_eq!(resp.body["errorNum"], json!(errno::CONFLICT));

        stale.params.insert("ignoreRevs".to_string(), "1".to_string());
        let resp = store.handle("school", &stale);
        assert_eq!(resp.status, 202);

        let mut read = call(Method::Get, "/_api/document/students/Rita", Value::Null);
        read.headers.insert("if-match".to_string(), "_stale".to_string());
        assert_eq!(store.handle("school", &read).status, 412);
    }

    #[test]
    fn test_patch_merges_and_put_replaces() {
        let mut store = with_students();
        store.handle(
            "school",
            &call(
                Method::Post,
                "/_api/document/students",
                json!({"_key": "Kris", "address": {"city": "Oslo", "zip": "0150"}, "age": 20}),
            ),
        );

        let mut patch = call(
            Method::Patch,
            "/_api/document/students/Kris",
            json!({"address": {"city": "Bergen"}, "age": null}),
        );
        patch.params.insert("keepNull".to_string(), "0".to_string());
        patch.params.insert("returnNew".to_string(), "1".to_string());
        let resp = store.handle("school", &patch);
        assert_eq!(resp.body["new"]["address"], json!({"city": "Bergen", "zip": "0150"}));
        assert!(resp.body["new"].get("age").is_none());

        let resp = store.handle(
            "school",
            &call(Method::Put, "/_api/document/students/Kris", json!({"name": "Kris"})),
        );
        assert_eq!(resp.status, 202);
        let doc = store.handle("school", &call(Method::Get, "/_api/document/students/Kris", Value::Null));
        assert!(doc.body.get("address").is_none());
        assert_eq!(doc.body["name"], json!("Kris"));
    }

    #[test]
    fn test_cursor_paging() {
        let mut store = with_students();
        for key in ["a", "b", "c"] {
            store.handle("school", &call(Method::Post, "/_api/document/students", json!({"_key": key})));
        }

        let first = store.handle(
            "school",
            &call(
                Method::Post,
                "/_api/cursor",
                json!({"query": "FOR s IN students RETURN s", "batchSize": 2, "count": true}),
            ),
        );
        assert_eq!(first.status, 201);
        assert_eq!(first.body["count"], json!(3));
        assert_eq!(first.body["result"].as_array().unwrap().len(), 2);
        assert_eq!(first.body["hasMore"], json!(true));
        let id = first.body["id"].as_str().unwrap().to_string();
        assert_eq!(store.open_cursors("school"), 1);

        let next = store.handle("school", &call(Method::Put, &format!("/_api/cursor/{}", id), Value::Null));
        assert_eq!(next.body["result"][0]["_key"], json!("c"));
        assert_eq!(next.body["hasMore"], json!(false));
        assert_eq!(store.open_cursors("school"), 0);

        let gone = store.handle("school", &call(Method::Delete, &format!("/_api/cursor/{}", id), Value::Null));
        assert_eq!(gone.body["errorNum"], json!(errno::CURSOR_NOT_FOUND));
    }

    #[test]
    fn test_query_errors() {
        let mut store = with_students();
        let resp = store.handle("school", &call(Method::Post, "/_api/cursor", json!({"query": "INVALID QUERY"})));
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["errorNum"], json!(errno::QUERY_PARSE));

        let resp = store.handle("school", &call(Method::Post, "/_api/cursor", json!({"query": "RETURN @who"})));
        assert_eq!(resp.body["errorNum"], json!(errno::QUERY_BIND_PARAMETER_MISSING));

        let resp = store.handle(
            "school",
            &call(Method::Post, "/_api/cursor", json!({"query": "FOR t IN courses RETURN t"})),
        );
        assert_eq!(resp.body["errorNum"], json!(errno::DATA_SOURCE_NOT_FOUND));

        let resp = store.handle("school", &call(Method::Post, "/_api/query", json!({"query": "RETURN @who"})));
        assert_eq!(resp.body["bindVars"], json!(["who"]));
    }

    #[test]
    fn test_databases_are_isolated() {
        let mut store = with_students();
        let resp = store.handle("other", &call(Method::Get, "/_api/relation", Value::Null));
        assert_eq!(resp.body["result"], json!([]));
        assert_eq!(store.document_count("other", "students"), None);
    }
}
