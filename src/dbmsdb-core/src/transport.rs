use crate::error::Result;
use crate::request::Request;
use crate::response::Response;

/// Sends one request to one database and returns the prepared response.
///
/// Implementations own the HTTP session; the executors only borrow this
/// capability. Connection failures map to `Error::Transport`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send_request(&self, request: &Request) -> Result<Response>;

    /// Name of the database requests are scoped to
    fn db_name(&self) -> &str;

    /// `{host}/_db/{name}`, prepended to every endpoint
    fn url_prefix(&self) -> &str;
}
