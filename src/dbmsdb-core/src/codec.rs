//! Multipart framing for the `/_api/batch` endpoint.
//!
//! A composite request is a `multipart/form-data` body whose parts each
//! embed one complete HTTP/1.1 request. The server answers with the same
//! framing, one embedded HTTP response per part, in request order.
//!
//! Framing is strict CRLF. A body whose lines end in a bare LF is rejected
//! as a batch integrity error.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::request::{Headers, Request};

/// Content type of every batch part
pub const BATCH_PART_CONTENT_TYPE: &str = "application/x-dbms-batchpart";

/// Endpoint receiving composite requests
pub const BATCH_ENDPOINT: &str = "/_api/batch";

const CRLF: &str = "\r\n";
const BLANK_LINE: &str = "\r\n\r\n";

pub fn new_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={}", boundary)
}

/// Extract the boundary parameter from a multipart content type
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"'))
        })
        .filter(|boundary| !boundary.is_empty())
}

/// Render one request as an embedded HTTP/1.1 message
pub fn render_request(request: &Request) -> String {
    let mut lines = vec![format!(
        "{} {} HTTP/1.1",
        request.method,
        request.path_and_query()
    )];
    for (name, value) in &request.headers {
        lines.push(format!("{}: {}", name, value));
    }
    if let Some(body) = request.body_text() {
        lines.push(format!("{}{}", CRLF, body));
    }
    lines.join(CRLF)
}

/// Build the composite body from `(content id, request)` pairs, in order
pub fn encode_batch<'a, I>(boundary: &str, parts: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Request)>,
{
    let mut buffer = Vec::new();
    for (content_id, request) in parts {
        buffer.push(format!("--{}", boundary));
        buffer.push(format!("Content-Type: {}", BATCH_PART_CONTENT_TYPE));
        buffer.push(format!("Content-Id: {}", content_id));
        buffer.push(format!("{}{}", CRLF, render_request(request)));
    }
    buffer.push(format!("--{}--", boundary));
    buffer.join(CRLF)
}

/// One part of a multipart body: its part headers and embedded message
#[derive(Debug, Clone, PartialEq)]
pub struct RawPart {
    pub headers: Headers,
    pub message: String,
}

impl RawPart {
    pub fn content_id(&self) -> Option<&str> {
        self.headers.get("content-id").map(String::as_str)
    }
}

/// Split a multipart body into its parts, in order.
///
/// The closing delimiter is required; a body without it was cut short.
pub fn split_parts(boundary: &str, body: &str) -> Result<Vec<RawPart>> {
    let delimiter = format!("--{}", boundary);
    let mut segments = body.split(delimiter.as_str());

    // Anything before the first delimiter is preamble
    segments.next();

    let mut parts = Vec::new();
    for segment in segments {
        if segment.starts_with("--") {
            return Ok(parts);
        }
        parts.push(parse_part(segment)?);
    }

    Err(Error::BatchIntegrity(format!(
        "multipart body is missing the closing boundary after {} parts",
        parts.len()
    )))
}

fn parse_part(segment: &str) -> Result<RawPart> {
    let segment = segment.strip_prefix(CRLF).unwrap_or(segment);
    let segment = segment.strip_suffix(CRLF).unwrap_or(segment);

    let (head, message) = segment.split_once(BLANK_LINE).ok_or_else(|| {
        Error::BatchIntegrity("batch part has no header block".to_string())
    })?;

    Ok(RawPart {
        headers: parse_headers(head.lines()),
        message: message.to_string(),
    })
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Headers {
    lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

/// Embedded HTTP response unpacked from a batch part
#[derive(Debug, Clone, PartialEq)]
pub struct SubResponse {
    pub content_id: Option<String>,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: String,
}

/// Parse an embedded `HTTP/1.1 {code} {text}` response message
pub fn parse_response_message(message: &str) -> Result<(u16, String, Headers, String)> {
    let (head, body) = message.split_once(BLANK_LINE).unwrap_or((message, ""));
    let mut lines = head.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| Error::BatchIntegrity("batch part has no status line".to_string()))?;
    let mut fields = status_line.splitn(3, ' ');

    let version = fields.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(Error::BatchIntegrity(format!(
            "malformed status line in batch part: {:?}",
            status_line
        )));
    }
    let status_code = fields
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            Error::BatchIntegrity(format!(
                "malformed status code in batch part: {:?}",
                status_line
            ))
        })?;
    let status_text = fields.next().unwrap_or_default().to_string();

    Ok((status_code, status_text, parse_headers(lines), body.to_string()))
}

/// Decode a composite response into ordered sub-responses
pub fn decode_batch(boundary: &str, body: &str) -> Result<Vec<SubResponse>> {
    split_parts(boundary, body)?
        .into_iter()
        .map(|part| {
            let (status_code, status_text, headers, body) = parse_response_message(&part.message)?;
            Ok(SubResponse {
                content_id: part.content_id().map(str::to_string),
                status_code,
                status_text,
                headers,
                body,
            })
        })
        .collect()
}
