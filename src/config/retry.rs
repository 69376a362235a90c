use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// How the delay between two attempts grows
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base_delay_ms` between every attempt
    #[default]
    Constant,
    /// `(attempt + 1) * base_delay_ms` after the zero-based `attempt`
    Linear,
}

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts (0 means unlimited attempts)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub strategy: BackoffStrategy,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            strategy: BackoffStrategy::default(),
        }
    }
}

impl BackoffPolicy {
    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }

    /// Whether the zero-based `attempt` may still run
    pub fn allows(
        &self,
        attempt: usize,
    ) -> bool {
        self.is_unlimited() || attempt < self.max_attempts
    }

    /// Delay to wait after the zero-based `attempt` failed
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let millis = match self.strategy {
            BackoffStrategy::Constant => self.base_delay_ms,
            BackoffStrategy::Linear => {
                self.base_delay_ms.saturating_mul(attempt as u64 + 1)
            }
        };
        Duration::from_millis(millis.min(self.max_delay_ms))
    }

    pub fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.base_delay_ms must be greater than 0"
            ))));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        Ok(())
    }
}

/// Divide strategies by store operation
///
/// Update is bounded so a hot key cannot stall a caller forever. Delete is
/// unbounded by default: a lost delete race is re-read and either succeeds
/// or ends with `NotFound`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    #[serde(default = "default_update_policy")]
    pub update: BackoffPolicy,

    #[serde(default = "default_delete_policy")]
    pub delete: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            update: default_update_policy(),
            delete: default_delete_policy(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        if self.update.is_unlimited() {
            return Err(Error::Config(ConfigError::Message(
                "retry.update.max_attempts must be greater than 0".into(),
            )));
        }
        self.update.validate("update")?;
        self.delete.validate("delete")?;
        Ok(())
    }
}

fn default_update_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: 5,
        base_delay_ms: 10,
        max_delay_ms: 1000,
        strategy: BackoffStrategy::Linear,
    }
}
fn default_delete_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: 0,
        base_delay_ms: 10,
        max_delay_ms: 10,
        strategy: BackoffStrategy::Constant,
    }
}
fn default_max_attempts() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    10
}
fn default_max_delay_ms() -> u64 {
    1000
}
