//! Set commands

use serde::Serialize;
use serde::de::DeserializeOwned;

use redkit_core::{RedkitResult, Serializer, SetOperation, require_key};

use super::{RedisService, require_keys};
use crate::connection::Connector;

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Add a member; returns whether it was new
    pub async fn set_add<T>(&self, key: &str, member: &T) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        self.write(redis::cmd("SADD").arg(key).arg(payload)).await
    }

    /// Add several members; returns how many were new
    pub async fn set_add_many<T: Serialize>(&self, key: &str, members: &[T]) -> RedkitResult<u64> {
        require_key("key", key)?;
        if members.is_empty() {
            return Ok(0);
        }
        let payloads = self.serializer.serialize_all(members)?;
        self.write(redis::cmd("SADD").arg(key).arg(payloads)).await
    }

    pub async fn set_remove<T>(&self, key: &str, member: &T) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        self.write(redis::cmd("SREM").arg(key).arg(payload)).await
    }

    pub async fn set_remove_many<T: Serialize>(&self, key: &str, members: &[T]) -> RedkitResult<u64> {
        require_key("key", key)?;
        if members.is_empty() {
            return Ok(0);
        }
        let payloads = self.serializer.serialize_all(members)?;
        self.write(redis::cmd("SREM").arg(key).arg(payloads)).await
    }

    pub async fn set_contains<T>(&self, key: &str, member: &T) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let payload = self.encode(member)?;
        self.read(redis::cmd("SISMEMBER").arg(key).arg(payload)).await
    }

    pub async fn set_length(&self, key: &str) -> RedkitResult<u64> {
        require_key("key", key)?;
        self.read(redis::cmd("SCARD").arg(key)).await
    }

    pub async fn set_members<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<Vec<T>> {
        require_key("key", key)?;
        let payloads: Vec<String> = self.read(redis::cmd("SMEMBERS").arg(key)).await?;
        self.decode_all(payloads)
    }

    pub async fn set_random_member<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<T> {
        require_key("key", key)?;
        let payload: Option<String> = self.read(redis::cmd("SRANDMEMBER").arg(key)).await?;
        self.decode(payload)
    }

    /// Up to `count` distinct random members; a negative count allows repeats
    pub async fn set_random_members<T>(&self, key: &str, count: i64) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("key", key)?;
        let payloads: Vec<String> = self.read(redis::cmd("SRANDMEMBER").arg(key).arg(count)).await?;
        self.decode_all(payloads)
    }

    /// Remove and return a random member
    pub async fn set_pop<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<T> {
        require_key("key", key)?;
        let payload: Option<String> = self.write(redis::cmd("SPOP").arg(key)).await?;
        self.decode(payload)
    }

    /// Move a member between sets; returns whether it was present in `source`
    pub async fn set_move<T>(&self, source: &str, destination: &str, member: &T) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        require_key("source", source)?;
        require_key("destination", destination)?;
        let payload = self.encode(member)?;
        self.write(redis::cmd("SMOVE").arg(source).arg(destination).arg(payload))
            .await
    }

    /// Union, intersection or difference of two sets
    pub async fn set_combine<T>(&self, operation: SetOperation, first: &str, second: &str) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
    {
        require_key("first", first)?;
        require_key("second", second)?;
        self.set_combine_many(operation, &[first, second]).await
    }

    /// Combine any number of sets; the difference is taken against the first key
    pub async fn set_combine_many<T, Q>(&self, operation: SetOperation, keys: &[Q]) -> RedkitResult<Vec<T>>
    where
        T: DeserializeOwned + Default,
        Q: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        require_keys("keys", keys)?;
        let mut cmd = redis::cmd(operation.set_command(false));
        for key in keys {
            cmd.arg(key.as_ref());
        }
        let payloads: Vec<String> = self.read(&cmd).await?;
        self.decode_all(payloads)
    }

    /// Combine sets into `destination`; returns its resulting size
    pub async fn set_combine_and_store<Q: AsRef<str>>(
        &self,
        operation: SetOperation,
        destination: &str,
        keys: &[Q],
    ) -> RedkitResult<u64> {
        require_key("destination", destination)?;
        if keys.is_empty() {
            return Ok(0);
        }
        require_keys("keys", keys)?;
        let mut cmd = redis::cmd(operation.set_command(true));
        cmd.arg(destination);
        for key in keys {
            cmd.arg(key.as_ref());
        }
        self.write(&cmd).await
    }

    pub async fn set_remove_all(&self, key: &str) -> RedkitResult<bool> {
        self.key_delete(key).await
    }
}
