use dbmsdb_core::{ClientConfig, Error, Result};
use reqwest::Client as HttpClient;
use std::sync::Arc;

use crate::connection::HttpConnection;
use crate::database::StandardDatabase;

/// DbmsDB client. Cheap to clone; all databases share one HTTP pool.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    http: HttpClient,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Client for `url` with default settings
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::default().with_url(url))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to a database with explicit credentials.
    ///
    /// No request is sent; bad credentials surface on the first call.
    pub fn db(
        &self,
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> StandardDatabase {
        let connection = HttpConnection::new(self.http.clone(), &self.config, name, username, password);
        StandardDatabase::new(Arc::new(connection))
    }

    /// Connect to a database with the configured credentials
    pub fn database(&self, name: impl Into<String>) -> StandardDatabase {
        self.db(name, self.config.username.clone(), self.config.password.clone())
    }
}
