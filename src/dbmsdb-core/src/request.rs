use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Header and query parameter maps are ordered so requests render the same
/// way every time, whether sent directly or packed into a batch.
pub type Headers = BTreeMap<String, String>;
pub type Params = BTreeMap<String, String>;

/// Header identifying this driver to the server
pub const DRIVER_HEADER: &str = "x-dbms-driver";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// Parse a request-line method token (case-insensitive)
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            "HEAD" => Some(Method::Head),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload. JSON for API calls, raw text for composite batch bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    pub fn to_text(&self) -> String {
        match self {
            Body::Json(value) => value.to_string(),
            Body::Text(text) => text.clone(),
        }
    }
}

/// Conversion of query parameter values into their wire form.
///
/// Booleans become `"1"`/`"0"`, matching what the server expects.
pub trait ToParam {
    fn to_param(&self) -> String;
}

impl ToParam for bool {
    fn to_param(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }
}

impl ToParam for &str {
    fn to_param(&self) -> String {
        (*self).to_string()
    }
}

impl ToParam for String {
    fn to_param(&self) -> String {
        self.clone()
    }
}

macro_rules! numeric_param {
    ($($ty:ty),*) => {
        $(impl ToParam for $ty {
            fn to_param(&self) -> String {
                self.to_string()
            }
        })*
    };
}

numeric_param!(i32, i64, u32, u64, usize, f64);

/// Description of one logical server operation.
///
/// The endpoint is relative to the database prefix (`/_db/{name}`).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub endpoint: String,
    pub headers: Headers,
    pub params: Params,
    pub data: Option<Body>,
}

impl Request {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert(
            DRIVER_HEADER.to_string(),
            format!("dbmsdb-rs/{}", env!("CARGO_PKG_VERSION")),
        );

        Self {
            method,
            endpoint: endpoint.into(),
            headers,
            params: Params::new(),
            data: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToParam) -> Self {
        self.params.insert(name.into(), value.to_param());
        self
    }

    /// Set a parameter only when a value is given
    pub fn with_opt_param<V: ToParam>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_param(name, value),
            None => self,
        }
    }

    pub fn with_json(mut self, data: Value) -> Self {
        self.data = Some(Body::Json(data));
        self
    }

    pub fn with_text(mut self, data: impl Into<String>) -> Self {
        self.data = Some(Body::Text(data.into()));
        self
    }

    /// Endpoint followed by the url-encoded query string, if any
    pub fn path_and_query(&self) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("{}?{}", self.endpoint, query)
    }

    /// Serialized body, if any
    pub fn body_text(&self) -> Option<String> {
        self.data.as_ref().map(Body::to_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_headers() {
        let req = Request::new(Method::Get, "/_api/version");
        assert_eq!(
            req.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(req.headers[DRIVER_HEADER].starts_with("dbmsdb-rs/"));
    }

    #[test]
    fn test_bool_params_are_normalized() {
        let req = Request::new(Method::Post, "/_api/document/students")
            .with_param("silent", false)
            .with_param("returnNew", true)
            .with_opt_param("waitForSync", None::<bool>);

        assert_eq!(req.params["silent"], "0");
        assert_eq!(req.params["returnNew"], "1");
        assert!(!req.params.contains_key("waitForSync"));
    }

    #[test]
    fn test_path_and_query_is_sorted_and_encoded() {
        let req = Request::new(Method::Get, "/_api/document/students/Kris")
            .with_param("b", "x y")
            .with_param("a", 1u32);

        assert_eq!(req.path_and_query(), "/_api/document/students/Kris?a=1&b=x+y");
        assert_eq!(
            Request::new(Method::Get, "/_api/version").path_and_query(),
            "/_api/version"
        );
    }

    #[test]
    fn test_header_names_are_lowercased() {
        let req = Request::new(Method::Get, "/x").with_header("If-Match", "_rev1");
        assert_eq!(req.headers["if-match"], "_rev1");
    }

    #[test]
    fn test_body_text() {
        let req = Request::new(Method::Post, "/x").with_json(json!({"_key": "Kris"}));
        assert_eq!(req.body_text().as_deref(), Some(r#"{"_key":"Kris"}"#));

        let raw = Request::new(Method::Post, "/x").with_text("--b--");
        assert_eq!(raw.body_text().as_deref(), Some("--b--"));
        assert_eq!(Request::new(Method::Get, "/x").body_text(), None);
    }
}
