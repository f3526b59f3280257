//! Synchronous access to the façade
//!
//! [`BlockingRedisService`] owns a multi-threaded tokio runtime and drives
//! façade calls to completion with `block_on`. The runtime's workers also run
//! the connection's background tasks, so keep-alive and event delivery keep
//! working between blocking calls.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Handle, Runtime};

use redkit_core::{Expiry, JsonSerializer, RedkitError, RedkitResult, Serializer, When};

use crate::config::RedisOptions;
use crate::connection::{Connector, RedisConnector};
use crate::service::{RedisService, TransactionContext};

/// Blocking wrapper around a [`RedisService`]
///
/// Must not be used from inside an async runtime; calls made there fail
/// with [`RedkitError::Configuration`] instead of deadlocking.
pub struct BlockingRedisService<K: Connector = RedisConnector, S: Serializer = JsonSerializer> {
    service: RedisService<K, S>,
    runtime: Arc<Runtime>,
}

impl<K: Connector, S: Serializer> Clone for BlockingRedisService<K, S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl BlockingRedisService<RedisConnector, JsonSerializer> {
    pub fn from_options(options: RedisOptions) -> RedkitResult<Self> {
        Self::new(RedisService::from_options(options))
    }
}

impl<K: Connector, S: Serializer> BlockingRedisService<K, S> {
    /// Wrap a service, starting a dedicated runtime
    pub fn new(service: RedisService<K, S>) -> RedkitResult<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("redkit-blocking")
            .build()
            .map_err(|e| RedkitError::Configuration(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            service,
            runtime: Arc::new(runtime),
        })
    }

    /// The wrapped async service
    pub fn service(&self) -> &RedisService<K, S> {
        &self.service
    }

    /// Run any façade operation to completion
    ///
    /// ```rust,no_run
    /// # use redkit_client::{BlockingRedisService, RedisOptions};
    /// # fn demo() -> redkit_core::RedkitResult<()> {
    /// let redis = BlockingRedisService::from_options(RedisOptions::new("localhost:6379"))?;
    /// let members: Vec<String> = redis.run(|svc| async move { svc.set_members("tags").await })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn run<F, Fut, T>(&self, operation: F) -> RedkitResult<T>
    where
        F: FnOnce(RedisService<K, S>) -> Fut,
        Fut: Future<Output = RedkitResult<T>>,
    {
        if Handle::try_current().is_ok() {
            return Err(RedkitError::Configuration(
                "blocking calls cannot run inside an async runtime".to_string(),
            ));
        }
        self.runtime.block_on(operation(self.service.clone()))
    }

    pub fn string_get<T: DeserializeOwned + Default>(&self, key: &str) -> RedkitResult<T> {
        self.run(|svc| async move { svc.string_get(key).await })
    }

    pub fn string_set<T>(&self, key: &str, value: &T, expiry: Option<Expiry>, when: When) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        self.run(|svc| async move { svc.string_set(key, value, expiry, when).await })
    }

    pub fn key_exists(&self, key: &str) -> RedkitResult<bool> {
        self.run(|svc| async move { svc.key_exists(key).await })
    }

    pub fn key_delete(&self, key: &str) -> RedkitResult<bool> {
        self.run(|svc| async move { svc.key_delete(key).await })
    }

    pub fn hash_get<T: DeserializeOwned + Default>(&self, key: &str, field: &str) -> RedkitResult<T> {
        self.run(|svc| async move { svc.hash_get(key, field).await })
    }

    pub fn hash_set<T>(&self, key: &str, field: &str, value: &T, when: When) -> RedkitResult<bool>
    where
        T: Serialize + ?Sized,
    {
        self.run(|svc| async move { svc.hash_set(key, field, value, when).await })
    }

    pub fn list_right_push<T>(&self, key: &str, value: &T, when: When) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        self.run(|svc| async move { svc.list_right_push(key, value, when).await })
    }

    pub fn publish<T>(&self, channel: &str, message: &T) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        self.run(|svc| async move { svc.publish(channel, message).await })
    }

    pub fn transaction<F>(&self, stage: F) -> RedkitResult<bool>
    where
        F: FnOnce(&mut TransactionContext<'_, S>) -> RedkitResult<()> + Send,
    {
        self.run(|svc| async move { svc.transaction(stage).await })
    }
}

#[cfg(test)]
mod tests {
    use redis::Value;
    use redkit_testing::MockConnection;

    use super::*;
    use crate::service::test_support::service_with;

    #[test]
    fn test_blocking_calls_reach_the_store() {
        let mock = MockConnection::new()
            .with_reply(Value::Okay)
            .with_reply(Value::BulkString(b"\"v\"".to_vec()));
        let redis = BlockingRedisService::new(service_with(&mock)).unwrap();

        assert!(redis.string_set("k", "v", None, When::Always).unwrap());
        let value: String = redis.string_get("k").unwrap();
        assert_eq!(value, "v");
        assert_eq!(mock.command_count(), 2);
    }

    #[test]
    fn test_run_accepts_any_operation() {
        let mock = MockConnection::new().with_reply(Value::Int(4));
        let redis = BlockingRedisService::new(service_with(&mock)).unwrap();
        let length = redis.run(|svc| async move { svc.list_length("l").await }).unwrap();
        assert_eq!(length, 4);
    }

    #[test]
    fn test_blocking_transaction() {
        let mock = MockConnection::new();
        let redis = BlockingRedisService::new(service_with(&mock)).unwrap();
        let committed = redis
            .transaction(|tx| {
                tx.key_delete("a")?.key_delete("b")?;
                Ok(())
            })
            .unwrap();
        assert!(committed);
        assert_eq!(mock.command_count(), 2);
    }

    #[test]
    fn test_refuses_to_block_inside_a_runtime() {
        let mock = MockConnection::new();
        let redis = BlockingRedisService::new(service_with(&mock)).unwrap();
        let outer = Builder::new_current_thread().build().unwrap();

        let result = outer.block_on(async { redis.key_exists("k") });
        assert!(matches!(result, Err(RedkitError::Configuration(_))));
        assert_eq!(mock.command_count(), 0);
        drop(outer);
    }
}
