//! Storage Error Hierarchy
//!
//! Defines the error types surfaced by the object store, categorized by the
//! layer that produced them: object serialization, the coordinator, and the
//! optimistic-concurrency engine itself.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Create lost against an existing record. Terminal, never retried.
    #[error("Key already exists: {key}")]
    AlreadyExists { key: String },

    /// Get/Update/Delete on an absent key
    #[error("Key not found: {key}")]
    NotFound { key: String },

    /// Caller key that cannot be placed under the store prefix
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Malformed object state or stored bytes
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// A fenced update or delete lost too many consecutive revision races
    #[error("{operation} of {key} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        key: String,
        attempts: usize,
    },

    /// A single coordinator round trip exceeded the request timeout
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// Coordinator / transport failures
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Metric registry failures
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// Whether a caller may reasonably repeat the whole operation.
    ///
    /// `AlreadyExists`, `NotFound` and object errors are terminal answers;
    /// repeating the call cannot change them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RetriesExhausted { .. }
                | Error::Timeout { .. }
                | Error::Coordinator(CoordinatorError::Unavailable(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// Object state could not be serialized
    #[error("Encode failed: {source}")]
    Encode {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Stored bytes could not be deserialized into the target
    #[error("Decode failed: {source}")]
    Decode {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ObjectError {
    pub fn encode(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ObjectError::Encode {
            source: source.into(),
        }
    }

    pub fn decode(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ObjectError::Decode {
            source: source.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Endpoint unavailable or connection lost
    #[error("Coordinator unavailable: {0}")]
    Unavailable(String),

    /// The coordinator cancelled a change stream (e.g. history compacted)
    #[error("Watch canceled by coordinator: {reason}")]
    WatchCanceled { reason: String },

    /// Keys the coordinator returned that are not valid UTF-8
    #[error("Malformed key returned by coordinator")]
    MalformedKey,

    /// Client library failures with source context
    #[error("Coordinator transport error: {source}")]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(feature = "etcd")]
impl From<etcd_client::Error> for CoordinatorError {
    fn from(err: etcd_client::Error) -> Self {
        CoordinatorError::Transport {
            source: Box::new(err),
        }
    }
}
