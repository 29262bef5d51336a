use dbmsdb_core::request::{Headers, Method};
use dbmsdb_core::{errno, ApiExecutor, Error, ErrorKind, Operation, Request, Result};
use serde_json::Value;

/// A document given by key, by id (`relation/key`) or by body
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentRef {
    Handle(String),
    Body(Value),
}

impl From<&str> for DocumentRef {
    fn from(handle: &str) -> Self {
        DocumentRef::Handle(handle.to_string())
    }
}

impl From<String> for DocumentRef {
    fn from(handle: String) -> Self {
        DocumentRef::Handle(handle)
    }
}

impl From<Value> for DocumentRef {
    fn from(body: Value) -> Self {
        DocumentRef::Body(body)
    }
}

impl From<&Value> for DocumentRef {
    fn from(body: &Value) -> Self {
        DocumentRef::Body(body.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    pub return_new: bool,
    pub return_old: bool,
    /// Return `true` instead of the document metadata
    pub silent: bool,
    /// Replace an existing document with the same key
    pub overwrite: bool,
    pub sync: Option<bool>,
    /// "replace" or "update"
    pub overwrite_mode: Option<String>,
    pub keep_none: Option<bool>,
    pub merge: Option<bool>,
}

/// Revision handling for `get` and `has`
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Expected revision, overriding any `_rev` in the document body
    pub rev: Option<String>,
    pub check_rev: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            rev: None,
            check_rev: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub check_rev: bool,
    pub merge: bool,
    pub keep_none: bool,
    pub return_new: bool,
    pub return_old: bool,
    pub sync: Option<bool>,
    pub silent: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            check_rev: true,
            merge: true,
            keep_none: true,
            return_new: false,
            return_old: false,
            sync: None,
            silent: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplaceOptions {
    pub check_rev: bool,
    pub return_new: bool,
    pub return_old: bool,
    pub sync: Option<bool>,
    pub silent: bool,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            check_rev: true,
            return_new: false,
            return_old: false,
            sync: None,
            silent: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub rev: Option<String>,
    pub check_rev: bool,
    /// Return `false` instead of failing when the document does not exist
    pub ignore_missing: bool,
    pub return_old: bool,
    pub sync: Option<bool>,
    pub silent: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            rev: None,
            check_rev: true,
            ignore_missing: false,
            return_old: false,
            sync: None,
            silent: false,
        }
    }
}

/// Drop the `error`/`code` envelope fields from a response body
pub(crate) fn strip_envelope(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        map.remove("error");
        map.remove("code");
    }
    body
}

fn rename_old_rev(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        if let Some(old_rev) = map.remove("_oldRev") {
            map.insert("_old_rev".to_string(), old_rev);
        }
    }
    body
}

/// Document relation (collection) wrapper
#[derive(Clone)]
pub struct Relation<E: ApiExecutor> {
    name: String,
    id_prefix: String,
    executor: E,
}

impl<E: ApiExecutor> Relation<E> {
    pub(crate) fn new(executor: E, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id_prefix: format!("{}/", name),
            name,
            executor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn validate_id(&self, doc_id: &str) -> Result<String> {
        if !doc_id.starts_with(&self.id_prefix) {
            return Err(Error::DocumentParse(format!(
                "bad relation name in document ID \"{}\"",
                doc_id
            )));
        }
        Ok(doc_id.to_string())
    }

    fn extract_id(&self, body: &Value) -> Result<String> {
        if let Some(doc_id) = body.get("_id").and_then(Value::as_str) {
            return self.validate_id(doc_id);
        }
        match body.get("_key").and_then(Value::as_str) {
            Some(key) => Ok(format!("{}{}", self.id_prefix, key)),
            None => Err(Error::DocumentParse(
                "field \"_key\" or \"_id\" required".to_string(),
            )),
        }
    }

    /// Document id plus the `If-Match` header when a revision must be checked
    fn prep_from_doc(
        &self,
        document: DocumentRef,
        rev: Option<String>,
        check_rev: bool,
    ) -> Result<(String, Headers)> {
        let (doc_id, rev) = match document {
            DocumentRef::Body(body) => {
                let doc_id = self.extract_id(&body)?;
                let rev = rev.or_else(|| body.get("_rev").and_then(Value::as_str).map(str::to_string));
                (doc_id, rev)
            }
            DocumentRef::Handle(handle) if handle.contains('/') => (self.validate_id(&handle)?, rev),
            DocumentRef::Handle(key) => (format!("{}{}", self.id_prefix, key), rev),
        };

        let mut headers = Headers::new();
        if let (true, Some(rev)) = (check_rev, rev) {
            headers.insert("if-match".to_string(), rev);
        }
        Ok((doc_id, headers))
    }

    fn ensure_key_from_id(&self, mut body: Value) -> Result<Value> {
        if body.get("_key").is_some() {
            return Ok(body);
        }
        if let Some(doc_id) = body.get("_id").and_then(Value::as_str).map(str::to_string) {
            let doc_id = self.validate_id(&doc_id)?;
            body["_key"] = Value::String(doc_id[self.id_prefix.len()..].to_string());
        }
        Ok(body)
    }

    pub(crate) fn insert_operation(
        &self,
        document: Value,
        options: &InsertOptions,
    ) -> Result<Operation<Value>> {
        let document = self.ensure_key_from_id(document)?;
        let silent = options.silent;

        let request = Request::new(Method::Post, format!("/_api/document/{}", self.name))
            .with_param("returnNew", options.return_new)
            .with_param("silent", silent)
            .with_param("overwrite", options.overwrite)
            .with_param("returnOld", options.return_old)
            .with_opt_param("waitForSync", options.sync)
            .with_opt_param("overwriteMode", options.overwrite_mode.clone())
            .with_opt_param("keepNull", options.keep_none)
            .with_opt_param("mergeObjects", options.merge)
            .with_json(document);

        Ok(Operation::new(request, move |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentInsert, &resp));
            }
            if silent {
                return Ok(Value::Bool(true));
            }
            Ok(rename_old_rev(resp.body))
        }))
    }

    pub(crate) fn get_operation(
        &self,
        document: DocumentRef,
        options: ReadOptions,
    ) -> Result<Operation<Option<Value>>> {
        let (handle, headers) = self.prep_from_doc(document, options.rev, options.check_rev)?;
        let request =
            Request::new(Method::Get, format!("/_api/document/{}", handle)).with_headers(headers);

        Ok(Operation::new(request, |resp| {
            if resp.error_code == Some(errno::DOCUMENT_NOT_FOUND) {
                return Ok(None);
            }
            if resp.status_code == 412 {
                return Err(Error::server(ErrorKind::DocumentRevision, &resp));
            }
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentGet, &resp));
            }
            Ok(Some(resp.body))
        }))
    }

    pub(crate) fn has_operation(
        &self,
        document: DocumentRef,
        options: ReadOptions,
    ) -> Result<Operation<bool>> {
        let (handle, headers) = self.prep_from_doc(document, options.rev, options.check_rev)?;
        let request =
            Request::new(Method::Get, format!("/_api/document/{}", handle)).with_headers(headers);

        Ok(Operation::new(request, |resp| {
            if resp.error_code == Some(errno::DOCUMENT_NOT_FOUND) {
                return Ok(false);
            }
            if resp.status_code == 412 {
                return Err(Error::server(ErrorKind::DocumentRevision, &resp));
            }
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentIn, &resp));
            }
            Ok(true)
        }))
    }

    pub(crate) fn update_operation(
        &self,
        document: Value,
        options: &UpdateOptions,
    ) -> Result<Operation<Value>> {
        let doc_id = self.extract_id(&document)?;
        let silent = options.silent;

        let request = Request::new(Method::Patch, format!("/_api/document/{}", doc_id))
            .with_param("keepNull", options.keep_none)
            .with_param("mergeObjects", options.merge)
            .with_param("returnNew", options.return_new)
            .with_param("returnOld", options.return_old)
            .with_param("ignoreRevs", !options.check_rev)
            .with_param("overwrite", !options.check_rev)
            .with_param("silent", silent)
            .with_opt_param("waitForSync", options.sync)
            .with_json(document);

        Ok(Operation::new(request, move |resp| {
            if resp.status_code == 412 {
                return Err(Error::server(ErrorKind::DocumentRevision, &resp));
            }
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentUpdate, &resp));
            }
            if silent {
                return Ok(Value::Bool(true));
            }
            Ok(rename_old_rev(resp.body))
        }))
    }

    pub(crate) fn replace_operation(
        &self,
        document: Value,
        options: &ReplaceOptions,
    ) -> Result<Operation<Value>> {
        let doc_id = self.extract_id(&document)?;
        let silent = options.silent;

        let request = Request::new(Method::Put, format!("/_api/document/{}", doc_id))
            .with_param("returnNew", options.return_new)
            .with_param("returnOld", options.return_old)
            .with_param("ignoreRevs", !options.check_rev)
            .with_param("overwrite", !options.check_rev)
            .with_param("silent", silent)
            .with_opt_param("waitForSync", options.sync)
            .with_json(document);

        Ok(Operation::new(request, move |resp| {
            if resp.status_code == 412 {
                return Err(Error::server(ErrorKind::DocumentRevision, &resp));
            }
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentReplace, &resp));
            }
            if silent {
                return Ok(Value::Bool(true));
            }
            Ok(rename_old_rev(resp.body))
        }))
    }

    pub(crate) fn delete_operation(
        &self,
        document: DocumentRef,
        options: &DeleteOptions,
    ) -> Result<Operation<Value>> {
        let (handle, headers) =
            self.prep_from_doc(document, options.rev.clone(), options.check_rev)?;
        let silent = options.silent;
        let ignore_missing = options.ignore_missing;

        let request = Request::new(Method::Delete, format!("/_api/document/{}", handle))
            .with_param("returnOld", options.return_old)
            .with_param("ignoreRevs", !options.check_rev)
            .with_param("overwrite", !options.check_rev)
            .with_param("silent", silent)
            .with_opt_param("waitForSync", options.sync)
            .with_headers(headers);

        Ok(Operation::new(request, move |resp| {
            if resp.error_code == Some(errno::DOCUMENT_NOT_FOUND) && ignore_missing {
                return Ok(Value::Bool(false));
            }
            if resp.status_code == 412 {
                return Err(Error::server(ErrorKind::DocumentRevision, &resp));
            }
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentDelete, &resp));
            }
            if silent {
                return Ok(Value::Bool(true));
            }
            Ok(resp.body)
        }))
    }

    /// Insert a document.
    ///
    /// Returns the document metadata (`_id`, `_key`, `_rev`, plus `new`/`old`
    /// when requested), or `true` when `silent` is set. A `_key` is derived
    /// from `_id` when only the latter is given.
    pub async fn insert(&self, document: Value, options: InsertOptions) -> Result<E::Output<Value>> {
        let operation = self.insert_operation(document, &options)?;
        self.executor.execute(operation).await
    }

    /// Fetch a document, `None` when it does not exist
    pub async fn get(
        &self,
        document: impl Into<DocumentRef>,
        options: ReadOptions,
    ) -> Result<E::Output<Option<Value>>> {
        let operation = self.get_operation(document.into(), options)?;
        self.executor.execute(operation).await
    }

    pub async fn has(
        &self,
        document: impl Into<DocumentRef>,
        options: ReadOptions,
    ) -> Result<E::Output<bool>> {
        let operation = self.has_operation(document.into(), options)?;
        self.executor.execute(operation).await
    }

    /// Patch a document. The body must carry `_key` or `_id`.
    pub async fn update(&self, document: Value, options: UpdateOptions) -> Result<E::Output<Value>> {
        let operation = self.update_operation(document, &options)?;
        self.executor.execute(operation).await
    }

    pub async fn replace(
        &self,
        document: Value,
        options: ReplaceOptions,
    ) -> Result<E::Output<Value>> {
        let operation = self.replace_operation(document, &options)?;
        self.executor.execute(operation).await
    }

    /// Delete a document.
    ///
    /// Returns the metadata, `true` when `silent` is set, or `false` for a
    /// missing document with `ignore_missing`.
    pub async fn delete(
        &self,
        document: impl Into<DocumentRef>,
        options: DeleteOptions,
    ) -> Result<E::Output<Value>> {
        let operation = self.delete_operation(document.into(), &options)?;
        self.executor.execute(operation).await
    }

    /// Number of documents
    pub async fn count(&self) -> Result<E::Output<u64>> {
        let request = Request::new(Method::Get, format!("/_api/relation/{}/count", self.name));
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::DocumentCount, &resp));
            }
            Ok(resp.body["count"].as_u64().unwrap_or_default())
        });
        self.executor.execute(operation).await
    }

    /// Remove every document
    pub async fn truncate(&self) -> Result<E::Output<bool>> {
        let request = Request::new(Method::Put, format!("/_api/relation/{}/truncate", self.name));
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::RelationTruncate, &resp));
            }
            Ok(true)
        });
        self.executor.execute(operation).await
    }

    pub async fn properties(&self) -> Result<E::Output<Value>> {
        let request =
            Request::new(Method::Get, format!("/_api/relation/{}/properties", self.name));
        let operation = Operation::new(request, |resp| {
            if !resp.is_success {
                return Err(Error::server(ErrorKind::RelationProperties, &resp));
            }
            Ok(strip_envelope(resp.body))
        });
        self.executor.execute(operation).await
    }
}
