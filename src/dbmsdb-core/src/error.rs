use std::fmt;

use crate::request::{Headers, Method};
use crate::response::Response;

/// Which API call a server-reported failure belongs to.
///
/// Batched and direct calls share response handlers, so the same failure
/// carries the same kind on both paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BatchExecute,
    CursorClose,
    CursorNext,
    DocumentCount,
    DocumentDelete,
    DocumentGet,
    DocumentIn,
    DocumentInsert,
    DocumentReplace,
    DocumentRevision,
    DocumentUpdate,
    RelationCreate,
    RelationDelete,
    RelationList,
    RelationProperties,
    RelationTruncate,
    ServerVersion,
    SqlQueryExecute,
    SqlQueryExplain,
    SqlQueryValidate,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BatchExecute => "batch execute",
            ErrorKind::CursorClose => "cursor close",
            ErrorKind::CursorNext => "cursor next",
            ErrorKind::DocumentCount => "document count",
            ErrorKind::DocumentDelete => "document delete",
            ErrorKind::DocumentGet => "document get",
            ErrorKind::DocumentIn => "document in",
            ErrorKind::DocumentInsert => "document insert",
            ErrorKind::DocumentReplace => "document replace",
            ErrorKind::DocumentRevision => "document revision",
            ErrorKind::DocumentUpdate => "document update",
            ErrorKind::RelationCreate => "relation create",
            ErrorKind::RelationDelete => "relation delete",
            ErrorKind::RelationList => "relation list",
            ErrorKind::RelationProperties => "relation properties",
            ErrorKind::RelationTruncate => "relation truncate",
            ErrorKind::ServerVersion => "server version",
            ErrorKind::SqlQueryExecute => "sql query execute",
            ErrorKind::SqlQueryExplain => "sql query explain",
            ErrorKind::SqlQueryValidate => "sql query validate",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the server for one API call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ServerError {
    pub kind: ErrorKind,
    /// `[HTTP {code}][ERR {errno}] {text}`
    pub message: String,
    /// Server `errorNum`, or the HTTP status when the body had none
    pub error_code: i64,
    /// Raw `errorMessage` from the body
    pub error_message: Option<String>,
    pub http_code: u16,
    pub http_method: Method,
    pub http_headers: Headers,
    pub url: String,
}

impl ServerError {
    pub fn new(kind: ErrorKind, resp: &Response) -> Self {
        Self::with_message(kind, resp, None)
    }

    pub fn with_message(kind: ErrorKind, resp: &Response, msg: Option<&str>) -> Self {
        let text = msg
            .map(str::to_string)
            .or_else(|| resp.error_message.clone())
            .unwrap_or_else(|| resp.status_text.clone());

        let (message, error_code) = match resp.error_code {
            Some(code) => (
                format!("[HTTP {}][ERR {}] {}", resp.status_code, code, text),
                code,
            ),
            None => (
                format!("[HTTP {}] {}", resp.status_code, text),
                i64::from(resp.status_code),
            ),
        };

        Self {
            kind,
            message,
            error_code,
            error_message: resp.error_message.clone(),
            http_code: resp.status_code,
            http_method: resp.method,
            http_headers: resp.headers.clone(),
            url: resp.url.clone(),
        }
    }
}

/// Errors produced by the driver.
///
/// `Clone` so a single transport or integrity failure can be handed to every
/// job of a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("batch state error: {0}")]
    BatchState(String),

    #[error("batch job result not available: {0}")]
    JobResultUnavailable(String),

    #[error("batch integrity error: {0}")]
    BatchIntegrity(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("document parse error: {0}")]
    DocumentParse(String),

    #[error("cursor state error: {0}")]
    CursorState(String),

    #[error("cursor empty: {0}")]
    CursorEmpty(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn server(kind: ErrorKind, resp: &Response) -> Self {
        Error::Server(ServerError::new(kind, resp))
    }

    /// Server-side details, if the server reported this failure
    pub fn as_server(&self) -> Option<&ServerError> {
        match self {
            Error::Server(err) => Some(err),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.as_server().map(|err| err.kind)
    }

    pub fn http_code(&self) -> Option<u16> {
        self.as_server().map(|err| err.http_code)
    }

    pub fn error_code(&self) -> Option<i64> {
        self.as_server().map(|err| err.error_code)
    }

    /// Whether the error came from the server rather than the client
    pub fn is_server(&self) -> bool {
        self.as_server().is_some()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
