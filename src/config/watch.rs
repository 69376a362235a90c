use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::constants::DEFAULT_WATCH_EVENT_BUFFER_SIZE;
use crate::Error;
use crate::Result;

/// Configuration for watch delivery
///
/// # Configuration Example
///
/// ```toml
/// [watch]
/// event_buffer_size = 100
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Capacity of each watch handle's event queue
    ///
    /// When the consumer falls behind, the listener blocks on this queue
    /// instead of dropping events.
    ///
    /// **Default**: 100
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl WatchConfig {
    /// Validates watch configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.event_buffer_size must be greater than 0".into(),
            )));
        }

        if self.event_buffer_size > 10_000 {
            warn!(
                "watch.event_buffer_size ({}) is very large; every open watch reserves this many slots",
                self.event_buffer_size
            );
        }

        Ok(())
    }
}

const fn default_event_buffer_size() -> usize {
    DEFAULT_WATCH_EVENT_BUFFER_SIZE
}
