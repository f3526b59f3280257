//! Pluggable value serialization
//!
//! The façade never inspects payloads: it hands typed values to a
//! [`Serializer`] and stores whatever string comes back. Two rules hold for
//! every implementation:
//!
//! - a null value (`None`, `()`) serializes to an empty payload
//! - an empty payload deserializes to `T::default()`
//!
//! Malformed payloads fail with [`RedkitError::Serialization`] and never yield
//! a partially built value.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RedkitError, RedkitResult};

/// Converts typed values to and from wire payloads
pub trait Serializer: Send + Sync + 'static {
    /// Serialize a value into a payload
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> RedkitResult<String>;

    /// Deserialize a payload into a value
    fn deserialize<T: DeserializeOwned + Default>(&self, payload: &str) -> RedkitResult<T>;

    /// Deserialize an optional payload, treating a missing one like an empty one
    fn deserialize_opt<T: DeserializeOwned + Default>(
        &self,
        payload: Option<&str>,
    ) -> RedkitResult<T> {
        match payload {
            Some(payload) => self.deserialize(payload),
            None => Ok(T::default()),
        }
    }

    /// Serialize every value of a slice
    fn serialize_all<T: Serialize>(&self, values: &[T]) -> RedkitResult<Vec<String>> {
        values.iter().map(|value| self.serialize(value)).collect()
    }

    /// Deserialize every payload of a reply
    fn deserialize_all<T: DeserializeOwned + Default>(
        &self,
        payloads: Vec<Option<String>>,
    ) -> RedkitResult<Vec<T>> {
        payloads
            .iter()
            .map(|payload| self.deserialize_opt(payload.as_deref()))
            .collect()
    }
}

/// JSON serializer backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> RedkitResult<String> {
        let json = serde_json::to_string(value).map_err(RedkitError::serialization::<T, _>)?;
        if json == "null" {
            return Ok(String::new());
        }
        Ok(json)
    }

    fn deserialize<T: DeserializeOwned + Default>(&self, payload: &str) -> RedkitResult<T> {
        if payload.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(payload).map_err(RedkitError::serialization::<T, _>)
    }
}
