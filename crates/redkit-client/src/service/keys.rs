//! Key commands

use std::time::Duration;

use redkit_core::{Expiry, KeyType, RedkitError, RedkitResult, Serializer, When, require_key};

use super::{RedisService, require_keys};
use crate::connection::Connector;

impl<K: Connector, S: Serializer> RedisService<K, S> {
    pub async fn key_exists(&self, key: &str) -> RedkitResult<bool> {
        require_key("key", key)?;
        self.read(redis::cmd("EXISTS").arg(key)).await
    }

    /// Number of the given keys that exist
    pub async fn key_exists_many<Q: AsRef<str>>(&self, keys: &[Q]) -> RedkitResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        require_keys("keys", keys)?;
        let mut cmd = redis::cmd("EXISTS");
        for key in keys {
            cmd.arg(key.as_ref());
        }
        self.read(&cmd).await
    }

    /// Remove a key of any type; returns whether it existed
    pub async fn key_delete(&self, key: &str) -> RedkitResult<bool> {
        require_key("key", key)?;
        self.write(redis::cmd("DEL").arg(key)).await
    }

    /// Remove several keys; returns how many existed
    pub async fn key_delete_many<Q: AsRef<str>>(&self, keys: &[Q]) -> RedkitResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        require_keys("keys", keys)?;
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key.as_ref());
        }
        self.write(&cmd).await
    }

    /// Rename a key
    ///
    /// Returns `false` without a round trip when both names are equal, and
    /// `false` when the source key does not exist. `When::NotExists` only
    /// renames when `new_key` is free.
    pub async fn key_rename(&self, key: &str, new_key: &str, when: When) -> RedkitResult<bool> {
        require_key("key", key)?;
        require_key("new_key", new_key)?;
        if key == new_key {
            return Ok(false);
        }

        let outcome: RedkitResult<bool> = match when {
            When::Always => self
                .write::<()>(redis::cmd("RENAME").arg(key).arg(new_key))
                .await
                .map(|_| true),
            When::NotExists => self.write(redis::cmd("RENAMENX").arg(key).arg(new_key)).await,
            When::Exists => {
                return Err(RedkitError::argument(
                    "when",
                    "rename supports Always and NotExists only",
                ));
            }
        };

        match outcome {
            Err(RedkitError::Store(e)) if is_missing_key(&e) => Ok(false),
            other => other,
        }
    }

    /// Set or clear the time to live
    ///
    /// `None` removes any expiry. Absolute expiries are converted against the
    /// current time; a deadline in the past is forwarded as a negative value.
    pub async fn key_expire(&self, key: &str, expiry: Option<Expiry>) -> RedkitResult<bool> {
        require_key("key", key)?;
        match expiry {
            Some(expiry) => {
                self.write(redis::cmd("PEXPIRE").arg(key).arg(expiry.relative_millis()))
                    .await
            }
            None => self.key_persist(key).await,
        }
    }

    /// Remove the time to live; returns whether one was set
    pub async fn key_persist(&self, key: &str) -> RedkitResult<bool> {
        require_key("key", key)?;
        self.write(redis::cmd("PERSIST").arg(key)).await
    }

    /// Remaining time to live, `None` for missing or persistent keys
    pub async fn key_time_to_live(&self, key: &str) -> RedkitResult<Option<Duration>> {
        require_key("key", key)?;
        let millis: i64 = self.read(redis::cmd("PTTL").arg(key)).await?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    pub async fn key_type(&self, key: &str) -> RedkitResult<KeyType> {
        require_key("key", key)?;
        let reply: String = self.read(redis::cmd("TYPE").arg(key)).await?;
        Ok(KeyType::from_reply(&reply))
    }
}

fn is_missing_key(error: &redis::RedisError) -> bool {
    error.to_string().to_ascii_lowercase().contains("no such key")
}
