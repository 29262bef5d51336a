//! Server side of the `/_api/batch` endpoint.

use actix_web::http::StatusCode;
use dbmsdb_core::codec::{self, BATCH_PART_CONTENT_TYPE};
use dbmsdb_core::errno;
use dbmsdb_core::request::{Headers, Method, Params};
use tracing::debug;

use crate::store::{Call, MockResponse, Store};

/// Rendered composite response
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReply {
    pub body: String,
    /// Parts whose status is 400 or above
    pub errors: usize,
}

/// Parse an embedded HTTP/1.1 request message
pub fn parse_part_request(message: &str) -> Result<Call, String> {
    let (head, body) = message.split_once("\r\n\r\n").unwrap_or((message, ""));
    let mut lines = head.lines();

    let request_line = lines.next().unwrap_or_default();
    let mut fields = request_line.split_whitespace();
    let method = fields
        .next()
        .and_then(Method::parse)
        .ok_or_else(|| format!("malformed request line: {:?}", request_line))?;
    let target = fields
        .next()
        .ok_or_else(|| format!("request line has no target: {:?}", request_line))?;

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let params: Params = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let headers: Headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    Ok(Call {
        method,
        path: path.to_string(),
        params,
        headers,
        body: body.to_string(),
    })
}

fn render_part(boundary: &str, content_id: Option<&str>, resp: &MockResponse) -> String {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.body.to_string();

    let mut lines = vec![
        format!("--{}", boundary),
        format!("Content-Type: {}", BATCH_PART_CONTENT_TYPE),
    ];
    if let Some(content_id) = content_id {
        lines.push(format!("Content-Id: {}", content_id));
    }
    lines.push(String::new());
    lines.push(format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    ));
    lines.push("Content-Type: application/json; charset=utf-8".to_string());
    lines.push(format!("Content-Length: {}", body.len()));
    lines.push(String::new());
    lines.push(body);
    lines.join("\r\n")
}

/// Run every part of a composite request against the store, in order, and
/// render the composite response with the same boundary.
pub fn execute_batch(store: &mut Store, db: &str, boundary: &str, body: &str) -> Result<BatchReply, MockResponse> {
    let parts = codec::split_parts(boundary, body)
        .map_err(|err| MockResponse::error(400, errno::HTTP_BAD_PARAMETER, err.to_string()))?;

    let mut rendered = Vec::with_capacity(parts.len() + 1);
    let mut errors = 0;
    for part in &parts {
        let resp = match parse_part_request(&part.message) {
            Ok(call) => store.handle(db, &call),
            Err(message) => MockResponse::error(400, errno::HTTP_BAD_PARAMETER, message),
        };
        if resp.is_error() {
            errors += 1;
        }
        rendered.push(render_part(boundary, part.content_id(), &resp));
    }
    rendered.push(format!("--{}--", boundary));

    debug!(db, parts = parts.len(), errors, "Executed batch");
    Ok(BatchReply {
        body: rendered.join("\r\n"),
        errors,
    })
}

/// Error body for a composite request without a usable boundary
pub fn missing_boundary() -> MockResponse {
    MockResponse::error(
        400,
        errno::HTTP_BAD_PARAMETER,
        "invalid multipart message received: missing boundary",
    )
}
