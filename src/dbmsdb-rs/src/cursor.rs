use dbmsdb_core::request::Method;
use dbmsdb_core::{errno, Error, ErrorKind, Request, Result, Transport};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    extra: Option<CursorExtra>,
}

#[derive(Debug, Default, Deserialize)]
struct CursorExtra {
    #[serde(default)]
    stats: Option<Value>,
    #[serde(default)]
    warnings: Vec<Value>,
    #[serde(default)]
    profile: Option<Value>,
}

/// Client side of a server query cursor.
///
/// Holds the current batch locally and fetches the next one on demand.
/// Clones share the server-side cursor, so only one of them should be
/// advanced.
#[derive(Clone)]
pub struct Cursor {
    transport: Arc<dyn Transport>,
    id: Option<String>,
    count: Option<u64>,
    cached: bool,
    has_more: bool,
    batch: VecDeque<Value>,
    statistics: Option<Value>,
    warnings: Vec<Value>,
    profile: Option<Value>,
}

impl Cursor {
    pub(crate) fn from_body(transport: Arc<dyn Transport>, body: Value) -> Result<Self> {
        let mut cursor = Self {
            transport,
            id: None,
            count: None,
            cached: false,
            has_more: false,
            batch: VecDeque::new(),
            statistics: None,
            warnings: Vec::new(),
            profile: None,
        };
        cursor.apply(serde_json::from_value(body)?);
        Ok(cursor)
    }

    fn apply(&mut self, body: CursorBody) {
        if body.id.is_some() {
            self.id = body.id;
        }
        if body.count.is_some() {
            self.count = body.count;
        }
        self.cached = body.cached;
        self.has_more = body.has_more;
        self.batch.extend(body.result);

        if let Some(extra) = body.extra {
            if extra.stats.is_some() {
                self.statistics = extra.stats;
            }
            if extra.profile.is_some() {
                self.profile = extra.profile;
            }
            self.warnings = extra.warnings;
        }
    }

    /// Server-side id, absent when the whole result fit in the first batch
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Total result count, when the query asked for it
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn cached(&self) -> bool {
        self.cached
    }

    /// Items fetched but not yet consumed
    pub fn batch(&self) -> &VecDeque<Value> {
        &self.batch
    }

    pub fn statistics(&self) -> Option<&Value> {
        self.statistics.as_ref()
    }

    pub fn warnings(&self) -> &[Value] {
        &self.warnings
    }

    pub fn profile(&self) -> Option<&Value> {
        self.profile.as_ref()
    }

    /// Whether the current batch is exhausted
    pub fn empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Take the next item from the current batch without fetching
    pub fn pop(&mut self) -> Result<Value> {
        self.batch
            .pop_front()
            .ok_or_else(|| Error::CursorEmpty("current batch is empty".to_string()))
    }

    /// Next item, fetching a new batch when the current one is used up.
    /// `None` once the result is exhausted.
    pub async fn next(&mut self) -> Result<Option<Value>> {
        if self.batch.is_empty() && self.has_more {
            self.fetch().await?;
        }
        Ok(self.batch.pop_front())
    }

    /// Fetch the next batch from the server and append it to the current one.
    ///
    /// Returns the number of items received.
    pub async fn fetch(&mut self) -> Result<usize> {
        let id = self
            .id
            .clone()
            .ok_or_else(|| Error::CursorState("cursor ID not set".to_string()))?;

        let request = Request::new(Method::Put, format!("/_api/cursor/{}", id));
        let resp = self.transport.send_request(&request).await?;
        if !resp.is_success {
            return Err(Error::server(ErrorKind::CursorNext, &resp));
        }

        let body: CursorBody = serde_json::from_value(resp.body)?;
        let fetched = body.result.len();
        self.apply(body);

        debug!(cursor = %id, fetched, has_more = self.has_more, "Fetched cursor batch");
        Ok(fetched)
    }

    /// Drain the cursor into a vector
    pub async fn all(&mut self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Release the server-side cursor.
    ///
    /// `None` when there is no server-side cursor, `Some(false)` when it was
    /// already gone and `ignore_missing` is set.
    pub async fn close(&mut self, ignore_missing: bool) -> Result<Option<bool>> {
        let Some(id) = self.id.clone() else {
            return Ok(None);
        };

        let request = Request::new(Method::Delete, format!("/_api/cursor/{}", id));
        let resp = self.transport.send_request(&request).await?;
        if resp.is_success {
            self.has_more = false;
            return Ok(Some(true));
        }
        if resp.error_code == Some(errno::CURSOR_NOT_FOUND) && ignore_missing {
            return Ok(Some(false));
        }
        Err(Error::server(ErrorKind::CursorClose, &resp))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("has_more", &self.has_more)
            .field("batch", &self.batch.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmsdb_core::request::Headers;
    use dbmsdb_core::Response;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with queued responses in order
    struct Replay {
        replies: Mutex<VecDeque<(u16, Value)>>,
        seen: Mutex<Vec<Request>>,
    }

    impl Replay {
        fn new(replies: Vec<(u16, Value)>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl Transport for Replay {
        async fn send_request(&self, request: &Request) -> Result<Response> {
            self.seen.lock().unwrap().push(request.clone());
            let (status, body) = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((500, json!({"error": true, "errorNum": 4})));
            Ok(Response::new(request.method, "http://db", Headers::new(), status, "", body.to_string())
                .prepare())
        }

        fn db_name(&self) -> &str {
            "school"
        }

        fn url_prefix(&self) -> &str {
            "http://localhost:8529/_db/school"
        }
    }

    #[tokio::test]
    async fn test_next_fetches_following_batches() {
        let transport = Replay::new(vec![
            (200, json!({"id": "42", "result": [3], "hasMore": true})),
            (200, json!({"id": "42", "result": [4], "hasMore": false, "extra": {"stats": {"scannedFull": 4}}})),
        ]);
        let first = json!({"id": "42", "result": [1, 2], "hasMore": true, "count": 4, "cached": false});
        let mut cursor = Cursor::from_body(transport.clone(), first).unwrap();

        assert_eq!(cursor.id(), Some("42"));
        assert_eq!(cursor.count(), Some(4));
        assert_eq!(cursor.all().await.unwrap(), vec![json!(1), json!(2), json!(3), json!(4)]);
        assert!(!cursor.has_more());
        assert_eq!(cursor.statistics(), Some(&json!({"scannedFull": 4})));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, Method::Put);
        assert_eq!(seen[0].endpoint, "/_api/cursor/42");
    }

    #[tokio::test]
    async fn test_single_batch_cursor() {
        let transport = Replay::new(vec![]);
        let mut cursor =
            Cursor::from_body(transport.clone(), json!({"result": ["Kris"], "hasMore": false})).unwrap();

        assert_eq!(cursor.pop().unwrap(), json!("Kris"));
        assert!(cursor.empty());
        assert!(matches!(cursor.pop(), Err(Error::CursorEmpty(_))));
        assert_eq!(cursor.next().await.unwrap(), None);
        assert!(matches!(cursor.fetch().await, Err(Error::CursorState(_))));
        assert_eq!(cursor.close(false).await.unwrap(), None);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close() {
        let gone = json!({"error": true, "code": 404, "errorNum": 1600, "errorMessage": "cursor not found"});
        let transport = Replay::new(vec![(202, json!({"id": "7"})), (404, gone.clone()), (404, gone)]);
        let mut cursor =
            Cursor::from_body(transport.clone(), json!({"id": "7", "result": [], "hasMore": true})).unwrap();

        assert_eq!(cursor.close(false).await.unwrap(), Some(true));
        assert_eq!(cursor.close(true).await.unwrap(), Some(false));

        let err = cursor.close(false).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CursorClose));
        assert_eq!(err.error_code(), Some(errno::CURSOR_NOT_FOUND));
        assert_eq!(transport.seen.lock().unwrap()[0].method, Method::Delete);
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let transport = Replay::new(vec![(
            404,
            json!({"error": true, "code": 404, "errorNum": 1600, "errorMessage": "cursor not found"}),
        )]);
        let mut cursor =
            Cursor::from_body(transport, json!({"id": "9", "result": [], "hasMore": true})).unwrap();

        let err = cursor.next().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CursorNext));
    }
}
