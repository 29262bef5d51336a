use serde_json::Value;

use crate::request::{Headers, Method};

/// HTTP response, either from a direct call or unpacked from a batch part.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub status_code: u16,
    pub status_text: String,
    pub raw_body: String,
    pub body: Value,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    pub is_success: bool,
}

impl Response {
    pub fn new(
        method: Method,
        url: impl Into<String>,
        headers: Headers,
        status_code: u16,
        status_text: impl Into<String>,
        raw_body: impl Into<String>,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            headers,
            status_code,
            status_text: status_text.into(),
            raw_body: raw_body.into(),
            body: Value::Null,
            error_code: None,
            error_message: None,
            is_success: false,
        }
    }

    /// Parse the body and pick up the server's error fields.
    ///
    /// Bodies that are not JSON are kept as a string value. A response is
    /// successful only with a 2xx status and no `errorNum` in the body.
    pub fn prepare(mut self) -> Self {
        self.body = serde_json::from_str(&self.raw_body)
            .unwrap_or_else(|_| Value::String(self.raw_body.clone()));

        if let Value::Object(map) = &self.body {
            self.error_code = map.get("errorNum").and_then(Value::as_i64);
            self.error_message = map
                .get("errorMessage")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        let http_ok = (200..300).contains(&self.status_code);
        self.is_success = http_ok && self.error_code.is_none();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> Response {
        Response::new(Method::Post, "http://db/_db/test/_api/cursor", Headers::new(), status, "", body)
            .prepare()
    }

    #[test]
    fn test_success_response() {
        let resp = response(201, r#"{"_key":"Kris","_id":"students/Kris"}"#);
        assert!(resp.is_success);
        assert_eq!(resp.body["_key"], json!("Kris"));
        assert_eq!(resp.error_code, None);
    }

    #[test]
    fn test_error_fields_are_extracted() {
        let resp = response(
            400,
            r#"{"error":true,"code":400,"errorNum":1501,"errorMessage":"syntax error"}"#,
        );
        assert!(!resp.is_success);
        assert_eq!(resp.error_code, Some(1501));
        assert_eq!(resp.error_message.as_deref(), Some("syntax error"));
    }

    #[test]
    fn test_error_num_on_2xx_is_failure() {
        let resp = response(200, r#"{"errorNum":1202,"errorMessage":"document not found"}"#);
        assert!(!resp.is_success);
    }

    #[test]
    fn test_non_json_body_kept_as_string() {
        let resp = response(200, "plain text");
        assert!(resp.is_success);
        assert_eq!(resp.body, Value::String("plain text".to_string()));
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        let resp = Response::new(Method::Get, "u", headers, 200, "OK", "");
        assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    }
}
