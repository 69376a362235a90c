//! Serializable object contract
//!
//! Every value handed to a [`Storage`](crate::Storage) implements [`Object`].
//! The store never looks inside an object: it only asks it to encode itself
//! to bytes, to decode bytes into itself, and to produce a detached copy that
//! can serve as a fresh decode target.
//!
//! [`JsonEntity`] covers the common case of any serde type stored as JSON.

mod json;

pub use json::*;


use crate::ObjectError;

/// Capability required of every stored value.
pub trait Object: Send + Sync + 'static {
    /// Serializes the current state.
    ///
    /// # Errors
    /// [`ObjectError::Encode`] when the internal state cannot be represented.
    fn encode(&self) -> Result<Vec<u8>, ObjectError>;

    /// Populates `self` from `data`.
    ///
    /// Must be safe to call on an instance freshly produced by
    /// [`clone_object`](Object::clone_object). On error the receiver should be
    /// left as it was.
    ///
    /// # Errors
    /// [`ObjectError::Decode`] on malformed input.
    fn decode(
        &mut self,
        data: &[u8],
    ) -> Result<(), ObjectError>;

    /// Returns a new instance with independent storage, usable as a decode
    /// target without aliasing `self`.
    fn clone_object(&self) -> Self
    where
        Self: Sized;
}
