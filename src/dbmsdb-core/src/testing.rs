//! In-memory transport and canned responses for unit tests

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use crate::codec;
use crate::error::Result;
use crate::request::{Headers, Request};
use crate::response::Response;
use crate::transport::Transport;

pub(crate) const URL_PREFIX: &str = "http://localhost:8529/_db/test";

type Script = Box<dyn Fn(&Request) -> Result<Response> + Send + Sync>;

/// Transport that records every request and answers from a closure
pub(crate) struct ScriptedTransport {
    script: Script,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Request) -> Result<Response> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send_request(&self, request: &Request) -> Result<Response> {
        self.requests.lock().push(request.clone());
        (self.script)(request)
    }

    fn db_name(&self) -> &str {
        "test"
    }

    fn url_prefix(&self) -> &str {
        URL_PREFIX
    }
}

pub(crate) fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "",
    }
}

pub(crate) fn json_response(req: &Request, status: u16, body: Value) -> Response {
    let mut headers = Headers::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    Response::new(
        req.method,
        format!("{}{}", URL_PREFIX, req.path_and_query()),
        headers,
        status,
        reason(status),
        body.to_string(),
    )
    .prepare()
}

/// Multipart response body with one embedded JSON response per entry
pub(crate) fn multipart_body(boundary: &str, parts: &[(Option<String>, u16, Value)]) -> String {
    let mut body = String::new();
    for (content_id, status, value) in parts {
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str(&format!("Content-Type: {}\r\n", codec::BATCH_PART_CONTENT_TYPE));
        if let Some(id) = content_id {
            body.push_str(&format!("Content-Id: {}\r\n", id));
        }
        body.push_str(&format!(
            "\r\nHTTP/1.1 {} {}\r\nContent-Type: application/json\r\n\r\n{}\r\n",
            status,
            reason(*status),
            value
        ));
    }
    body.push_str(&format!("--{}--", boundary));
    body
}

pub(crate) fn request_boundary(req: &Request) -> String {
    req.headers
        .get("content-type")
        .and_then(|ct| codec::boundary_from_content_type(ct))
        .unwrap_or_default()
        .to_string()
}

/// Content ids of the parts in a composite request, in order
pub(crate) fn request_content_ids(req: &Request) -> Vec<String> {
    let boundary = request_boundary(req);
    let body = req.body_text().unwrap_or_default();
    codec::split_parts(&boundary, &body)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.content_id().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Answer a composite request, pairing `parts` with its content ids in order
pub(crate) fn batch_response(req: &Request, parts: &[(u16, Value)]) -> Response {
    let boundary = request_boundary(req);
    let entries: Vec<(Option<String>, u16, Value)> = request_content_ids(req)
        .into_iter()
        .zip(parts.iter().cloned())
        .map(|(id, (status, value))| (Some(id), status, value))
        .collect();

    raw_batch_response(req, &boundary, multipart_body(&boundary, &entries))
}

pub(crate) fn raw_batch_response(req: &Request, boundary: &str, body: String) -> Response {
    let mut headers = Headers::new();
    headers.insert("content-type".to_string(), codec::content_type(boundary));
    Response::new(
        req.method,
        format!("{}{}", URL_PREFIX, req.endpoint),
        headers,
        200,
        "OK",
        body,
    )
    .prepare()
}
