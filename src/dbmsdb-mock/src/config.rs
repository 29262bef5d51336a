use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Settings of the mock server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 picks a free port
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Directory of the rolling log file
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Filter directives used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8529
}

fn default_username() -> String {
    "root".to_string()
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_log_filter() -> String {
    "dbmsdb_mock=debug,dbmsdb_core=debug,actix_web=info".to_string()
}

impl MockConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path))?;
        let config: MockConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path))?;
        Ok(config)
    }

    /// Loopback config on a free port, as used by tests
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            ..Self::default()
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: String::new(),
            log_dir: default_log_dir(),
            log_filter: default_log_filter(),
        }
    }
}
