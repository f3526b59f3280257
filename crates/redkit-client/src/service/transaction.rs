//! MULTI/EXEC batches
//!
//! [`RedisService::transaction`] hands the caller a [`TransactionContext`]
//! to queue commands on, then submits everything as one atomic unit. Staging
//! is synchronous; nothing reaches the store until the callback returns.

use redis::Value;
use serde::Serialize;
use tracing::debug;

use redkit_core::{
    CommandFlags, Expiry, ListSide, RedkitError, RedkitResult, Serializer, When, require_key,
};

use super::RedisService;
use super::lists::push_command;
use crate::connection::Connector;

/// Commands queued for one transaction
pub struct TransactionContext<'a, S: Serializer> {
    pipeline: redis::Pipeline,
    serializer: &'a S,
    queued: usize,
}

impl<'a, S: Serializer> TransactionContext<'a, S> {
    fn new(serializer: &'a S) -> Self {
        let mut pipeline = redis::pipe();
        pipeline.atomic();
        Self {
            pipeline,
            serializer,
            queued: 0,
        }
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.queued
    }

    pub fn is_empty(&self) -> bool {
        self.queued == 0
    }

    fn queue(&mut self, cmd: redis::Cmd) -> &mut Self {
        self.pipeline.add_command(cmd);
        self.queued += 1;
        self
    }

    pub fn string_set<T>(
        &mut self,
        key: &str,
        value: &T,
        expiry: Option<Expiry>,
        when: When,
    ) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(self.serializer.serialize(value)?);
        if let Some(expiry) = expiry {
            cmd.arg("PX").arg(expiry.relative_millis());
        }
        match when {
            When::Always => {}
            When::Exists => {
                cmd.arg("XX");
            }
            When::NotExists => {
                cmd.arg("NX");
            }
        }
        Ok(self.queue(cmd))
    }

    pub fn string_increment(&mut self, key: &str, by: i64) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        let mut cmd = redis::cmd("INCRBY");
        cmd.arg(key).arg(by);
        Ok(self.queue(cmd))
    }

    pub fn key_delete(&mut self, key: &str) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        Ok(self.queue(cmd))
    }

    pub fn key_expire(&mut self, key: &str, expiry: Option<Expiry>) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        let cmd = match expiry {
            Some(expiry) => {
                let mut cmd = redis::cmd("PEXPIRE");
                cmd.arg(key).arg(expiry.relative_millis());
                cmd
            }
            None => {
                let mut cmd = redis::cmd("PERSIST");
                cmd.arg(key);
                cmd
            }
        };
        Ok(self.queue(cmd))
    }

    pub fn list_left_push<T>(&mut self, key: &str, value: &T, when: When) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        self.list_push(ListSide::Left, key, value, when)
    }

    pub fn list_right_push<T>(&mut self, key: &str, value: &T, when: When) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        self.list_push(ListSide::Right, key, value, when)
    }

    fn list_push<T>(&mut self, side: ListSide, key: &str, value: &T, when: When) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd(push_command(side, when)?);
        cmd.arg(key).arg(self.serializer.serialize(value)?);
        Ok(self.queue(cmd))
    }

    pub fn list_right_push_many<T: Serialize>(&mut self, key: &str, values: &[T]) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        if values.is_empty() {
            return Ok(self);
        }
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key).arg(self.serializer.serialize_all(values)?);
        Ok(self.queue(cmd))
    }

    pub fn set_add<T>(&mut self, key: &str, member: &T) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key).arg(self.serializer.serialize(member)?);
        Ok(self.queue(cmd))
    }

    pub fn set_add_many<T: Serialize>(&mut self, key: &str, members: &[T]) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        if members.is_empty() {
            return Ok(self);
        }
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key).arg(self.serializer.serialize_all(members)?);
        Ok(self.queue(cmd))
    }

    pub fn set_remove<T>(&mut self, key: &str, member: &T) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd("SREM");
        cmd.arg(key).arg(self.serializer.serialize(member)?);
        Ok(self.queue(cmd))
    }

    pub fn sorted_set_add<T>(&mut self, key: &str, member: &T, score: f64) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key).arg(score).arg(self.serializer.serialize(member)?);
        Ok(self.queue(cmd))
    }

    pub fn sorted_set_increment<T>(&mut self, key: &str, member: &T, by: f64) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd("ZINCRBY");
        cmd.arg(key).arg(by).arg(self.serializer.serialize(member)?);
        Ok(self.queue(cmd))
    }

    pub fn sorted_set_remove<T>(&mut self, key: &str, member: &T) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        let mut cmd = redis::cmd("ZREM");
        cmd.arg(key).arg(self.serializer.serialize(member)?);
        Ok(self.queue(cmd))
    }

    pub fn hash_set<T>(&mut self, key: &str, field: &str, value: &T) -> RedkitResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        require_key("key", key)?;
        require_key("field", field)?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(self.serializer.serialize(value)?);
        Ok(self.queue(cmd))
    }

    pub fn hash_set_many<F, T>(&mut self, key: &str, entries: &[(F, T)]) -> RedkitResult<&mut Self>
    where
        F: AsRef<str>,
        T: Serialize,
    {
        require_key("key", key)?;
        if entries.is_empty() {
            return Ok(self);
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in entries {
            require_key("field", field.as_ref())?;
            cmd.arg(field.as_ref()).arg(self.serializer.serialize(value)?);
        }
        Ok(self.queue(cmd))
    }

    pub fn hash_delete(&mut self, key: &str, field: &str) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        require_key("field", field)?;
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(key).arg(field);
        Ok(self.queue(cmd))
    }

    pub fn hash_increment(&mut self, key: &str, field: &str, by: i64) -> RedkitResult<&mut Self> {
        require_key("key", key)?;
        require_key("field", field)?;
        let mut cmd = redis::cmd("HINCRBY");
        cmd.arg(key).arg(field).arg(by);
        Ok(self.queue(cmd))
    }
}

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Run staged commands as one MULTI/EXEC unit
    ///
    /// Returns whether EXEC committed. A callback that queues nothing
    /// commits trivially without contacting the store. If the callback fails,
    /// nothing is sent.
    ///
    /// ```rust,no_run
    /// # use redkit_client::RedisService;
    /// # use redkit_core::When;
    /// # async fn demo(service: RedisService) -> redkit_core::RedkitResult<()> {
    /// let committed = service
    ///     .transaction(|tx| {
    ///         tx.string_set("order:1", "paid", None, When::Always)?;
    ///         tx.list_right_push("orders:paid", "order:1", When::Always)?;
    ///         Ok(())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`RedkitError::Configuration`] behind a proxy that does not forward
    /// MULTI/EXEC.
    pub async fn transaction<F>(&self, stage: F) -> RedkitResult<bool>
    where
        F: FnOnce(&mut TransactionContext<'_, S>) -> RedkitResult<()> + Send,
    {
        let proxy = self.provider.options().proxy;
        if !proxy.supports_transactions() {
            return Err(RedkitError::Configuration(format!(
                "transactions are not available through {proxy:?}"
            )));
        }

        let pipeline = {
            let mut context = TransactionContext::new(self.serializer.as_ref());
            stage(&mut context)?;
            if context.is_empty() {
                return Ok(true);
            }
            debug!(commands = context.len(), "Submitting transaction");
            context.pipeline
        };

        self.ensure_not_cancelled()?;
        let mut connection = self.connection(CommandFlags::WRITE).await?;
        let replies: Option<Vec<Value>> = pipeline.query_async(&mut connection).await?;
        Ok(replies.is_some())
    }
}
