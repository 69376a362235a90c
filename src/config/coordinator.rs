use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Connection parameters for the key-value coordinator
///
/// ```toml
/// [coordinator]
/// endpoints = ["http://127.0.0.1:2379"]
/// connect_timeout_ms = 3000
/// request_timeout_ms = 5000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoordinatorConfig {
    /// Cluster member URLs used for bootstrap
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Connection establishment timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound for a single coordinator round trip in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CoordinatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "coordinator.endpoints must contain at least one endpoint".into(),
            )));
        }

        if let Some(empty) = self.endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(Error::Config(ConfigError::Message(format!(
                "coordinator.endpoints[{empty}] is empty"
            ))));
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "coordinator.connect_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "coordinator.request_timeout_ms must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:2379".to_string()]
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_request_timeout_ms() -> u64 {
    5000
}
