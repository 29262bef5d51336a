use dbmsdb_core::{ClientConfig, Error, Request, Response, Result, Transport};
use dbmsdb_core::request::Headers;
use reqwest::Client as HttpClient;
use tracing::debug;

/// HTTP session scoped to one database, authenticated with basic auth
#[derive(Clone)]
pub struct HttpConnection {
    client: HttpClient,
    db_name: String,
    url_prefix: String,
    username: String,
    password: String,
}

impl HttpConnection {
    pub fn new(
        client: HttpClient,
        config: &ClientConfig,
        db_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let db_name = db_name.into();
        Self {
            client,
            url_prefix: config.url_prefix(&db_name),
            db_name,
            username: username.into(),
            password: password.into(),
        }
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Transport(format!("request timed out: {}", err))
    } else {
        Error::Transport(err.to_string())
    }
}

#[async_trait::async_trait]
impl Transport for HttpConnection {
    #[tracing::instrument(
        skip(self, request),
        fields(db = %self.db_name, method = %request.method, endpoint = %request.endpoint)
    )]
    async fn send_request(&self, request: &Request) -> Result<Response> {
        let url = format!("{}{}", self.url_prefix, request.path_and_query());
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::Transport(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, &url)
            .basic_auth(&self.username, Some(&self.password));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body_text() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let raw_body = response.text().await.map_err(transport_error)?;

        debug!(status = status.as_u16(), bytes = raw_body.len(), "Received response");

        Ok(Response::new(
            request.method,
            url,
            headers,
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            raw_body,
        )
        .prepare())
    }

    fn db_name(&self) -> &str {
        &self.db_name
    }

    fn url_prefix(&self) -> &str {
        &self.url_prefix
    }
}
