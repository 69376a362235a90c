use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Object;
use crate::ObjectError;

/// Generic record wrapper stored as self-describing JSON text.
///
/// Any `serde` type becomes storable by wrapping it:
///
/// ```rust
/// use d_store::{Account, JsonEntity, Object};
///
/// let entity = JsonEntity::new(Account::new("kauri", "p1"));
/// let bytes = entity.encode().unwrap();
///
/// let mut target = entity.clone_object();
/// target.decode(&bytes).unwrap();
/// assert_eq!(target.entry(), entity.entry());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonEntity<T> {
    entry: T,
}

impl<T> JsonEntity<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(entry: T) -> Self {
        Self { entry }
    }

    pub fn entry(&self) -> &T {
        &self.entry
    }

    pub fn entry_mut(&mut self) -> &mut T {
        &mut self.entry
    }

    /// Replaces the wrapped value with a copy of `entry`
    pub fn set(
        &mut self,
        entry: &T,
    ) {
        self.entry = entry.clone();
    }

    pub fn into_entry(self) -> T {
        self.entry
    }
}

impl<T> From<T> for JsonEntity<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn from(entry: T) -> Self {
        Self::new(entry)
    }
}

impl<T> Object for JsonEntity<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn encode(&self) -> Result<Vec<u8>, ObjectError> {
        serde_json::to_vec(&self.entry).map_err(ObjectError::encode)
    }

    fn decode(
        &mut self,
        data: &[u8],
    ) -> Result<(), ObjectError> {
        if data.is_empty() {
            return Err(ObjectError::decode("empty payload"));
        }
        // Decode into a fresh value so a failure leaves `entry` untouched
        let entry: T = serde_json::from_slice(data).map_err(ObjectError::decode)?;
        self.entry = entry;
        Ok(())
    }

    fn clone_object(&self) -> Self {
        Self {
            entry: self.entry.clone(),
        }
    }
}
