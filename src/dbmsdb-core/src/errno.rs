//! Server error numbers (`errorNum`) the driver and the mock server act on.

// HTTP-level
pub const HTTP_BAD_PARAMETER: i64 = 400;
pub const HTTP_UNAUTHORIZED: i64 = 401;
pub const HTTP_NOT_FOUND: i64 = 404;
pub const HTTP_METHOD_NOT_ALLOWED: i64 = 405;
pub const HTTP_CORRUPTED_JSON: i64 = 600;

// Storage
pub const CONFLICT: i64 = 1200;
pub const DOCUMENT_NOT_FOUND: i64 = 1202;
pub const DATA_SOURCE_NOT_FOUND: i64 = 1203;
pub const DUPLICATE_NAME: i64 = 1207;
pub const ILLEGAL_NAME: i64 = 1208;
pub const UNIQUE_CONSTRAINT_VIOLATED: i64 = 1210;
pub const DOCUMENT_TYPE_INVALID: i64 = 1227;
pub const DOCUMENT_KEY_BAD: i64 = 1221;

// Query
pub const QUERY_PARSE: i64 = 1501;
pub const QUERY_EMPTY: i64 = 1502;
pub const QUERY_BIND_PARAMETER_MISSING: i64 = 1551;

// Cursors
pub const CURSOR_NOT_FOUND: i64 = 1600;
