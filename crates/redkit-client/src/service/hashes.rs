//! Hash commands
//!
//! Field names are sent as-is; only field values go through the serializer.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use redkit_core::{RedkitError, RedkitResult, Serializer, When, require_key};

use super::{RedisService, require_keys};
use crate::connection::Connector;

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Set one field; returns `true` when the field was created, `false` when updated
    ///
    /// With `When::NotExists` an existing field is left alone and `false` is returned.
    pub async fn hash_set<T>(&self, key: &str, field: &str, value: &T, when: When) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        require_key("field", field)?;
        let command = match when {
            When::Always => "HSET",
            When::NotExists => "HSETNX",
            When::Exists => {
                return Err(RedkitError::argument(
                    "when",
                    "hash set supports Always and NotExists only",
                ));
            }
        };
        let payload = self.encode(value)?;
        self.write(redis::cmd(command).arg(key).arg(field).arg(payload)).await
    }

    /// Set several fields at once
    pub async fn hash_set_many<F, T>(&self, key: &str, entries: &[(F, T)]) -> RedkitResult<()>
    where
        F: AsRef<str>,
        T: Serialize,
    {
        require_key("key", key)?;
        if entries.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in entries {
            require_key("field", field.as_ref())?;
            cmd.arg(field.as_ref()).arg(self.encode(value)?);
        }
        let _: u64 = self.write(&cmd).await?;
        Ok(())
    }

    pub async fn hash_get<T>(&self, key: &str, field: &str) -> RedkitResult<T>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        require_key("field", field)?;
        let payload: Option<String> = self.read(redis::cmd("HGET").arg(key).arg(field)).await?;
        self.decode(payload)
    }

    /// Values of several fields, in order; missing fields yield `T::default()`
    pub async fn hash_get_many<T, F>(&self, key: &str, fields: &[F]) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
        F: AsRef<str>,
    {
        require_key("key", key)?;
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        require_keys("fields", fields)?;
        let mut cmd = redis::cmd("HMGET");
        cmd.arg(key);
        for field in fields {
            cmd.arg(field.as_ref());
        }
        let payloads: Vec<Option<String>> = self.read(&cmd).await?;
        self.serializer.deserialize_all(payloads)
    }

    pub async fn hash_get_all<T>(&self, key: &str) -> RedkitResult<HashMap<String, T>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let raw: HashMap<String, String> = self.read(redis::cmd("HGETALL").arg(key)).await?;
        raw.into_iter()
            .map(|(field, payload)| Ok((field, self.serializer.deserialize(&payload)?)))
            .collect()
    }

    pub async fn hash_delete(&self, key: &str, field: &str) -> RedkitResult<bool> {
        require_key("key", key)?;
        require_key("field", field)?;
        self.write(redis::cmd("HDEL").arg(key).arg(field)).await
    }

    pub async fn hash_delete_many<F: AsRef<str>>(&self, key: &str, fields: &[F]) -> RedkitResult<u64> {
        require_key("key", key)?;
        if fields.is_empty() {
            return Ok(0);
        }
        require_keys("fields", fields)?;
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(key);
        for field in fields {
            cmd.arg(field.as_ref());
        }
        self.write(&cmd).await
    }

    pub async fn hash_exists(&self, key: &str, field: &str) -> RedkitResult<bool> {
        require_key("key", key)?;
        require_key("field", field)?;
        self.read(redis::cmd("HEXISTS").arg(key).arg(field)).await
    }

    pub async fn hash_length(&self, key: &str) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.read(redis::cmd("HLEN").arg(key)).await
    }

    pub async fn hash_keys(&self, key: &str) -> RedkitResult<Vec<String>> {
        require_key("key", key)?;
        self.read(redis::cmd("HKEYS").arg(key)).await
    }

    pub async fn hash_values<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<Vec<T>> {
        require_key("key", key)?;
        let payloads: Vec<String> = self.read(redis::cmd("HVALS").arg(key)).await?;
        self.decode_all(payloads)
    }

    pub async fn hash_increment(&self, key: &str, field: &str, by: i64) -> RedkitResult<i64> {
        require_key("key", key)?;
        require_key("field", field)?;
        self.write(redis::cmd("HINCRBY").arg(key).arg(field).arg(by)).await
    }

    pub async fn hash_decrement(&self, key: &str, field: &str, by: i64) -> RedkitResult<i64> {
        let by = by
            .checked_neg()
            .ok_or_else(|| RedkitError::argument("by", "decrement overflows"))?;
        self.hash_increment(key, field, by).await
    }

    pub async fn hash_increment_float(&self, key: &str, field: &str, by: f64) -> RedkitResult<f64> {
        require_key("key", key)?;
        require_key("field", field)?;
        self.write(redis::cmd("HINCRBYFLOAT").arg(key).arg(field).arg(by))
            .await
    }

    pub async fn hash_decrement_float(&self, key: &str, field: &str, by: f64) -> RedkitResult<f64> {
        self.hash_increment_float(key, field, -by).await
    }

    pub async fn hash_remove_all(&self, key: &str) -> RedkitResult<bool> {
        self.key_delete(key).await
    }
}
