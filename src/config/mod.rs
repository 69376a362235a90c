//! Configuration management module for the object store.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`DSTORE__` prefix)
//! - Component-wise validation
mod coordinator;
mod retry;
mod watch;
pub use coordinator::*;
pub use retry::*;
pub use watch::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix, e.g. `DSTORE__RETRY__UPDATE__MAX_ATTEMPTS=8`
pub const ENV_PREFIX: &str = "DSTORE";

/// Main configuration container for the store components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Coordinator endpoints and per-request timeouts
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Optimistic-concurrency retry policies
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Watch delivery parameters
    #[serde(default)]
    pub watch: WatchConfig,
}

impl StoreConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DSTORE__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("DSTORE__COORDINATOR__REQUEST_TIMEOUT_MS", "500");
    /// let cfg = StoreConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns the first validation error of any subsystem:
    /// - Empty endpoint list or zero timeouts
    /// - Zero retry delays or an unbounded update policy
    /// - Zero watch buffers
    pub fn validate(self) -> Result<Self> {
        self.coordinator.validate()?;
        self.retry.validate()?;
        self.watch.validate()?;
        Ok(self)
    }
}
