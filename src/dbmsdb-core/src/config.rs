use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for a DbmsDB client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URL of the server, without the `/_db/{name}` suffix
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,

    /// Applied to every HTTP request, including composite batch requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_url() -> String {
    "http://127.0.0.1:8529".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl ClientConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path))?;
        let config: ClientConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path))?;
        Ok(config)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `{url}/_db/{name}`
    pub fn url_prefix(&self, db_name: &str) -> String {
        format!("{}/_db/{}", self.url.trim_end_matches('/'), db_name)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: default_username(),
            password: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            insecure_skip_verify: false,
        }
    }
}
