//! Typed command façade
//!
//! [`RedisService`] exposes one method per store operation, grouped by data
//! structure in the submodules. Every operation follows the same shape:
//!
//! 1. validate arguments (empty required keys fail, empty slices short-circuit)
//! 2. serialize inputs
//! 3. obtain the shared connection, routed by the placement flag
//! 4. issue the command and deserialize the reply
//!
//! Reads default to [`CommandFlags::READ`], writes to [`CommandFlags::WRITE`].
//! A view created with [`RedisService::with_flags`] overrides both.
//!
//! ```rust,no_run
//! use redkit_client::{RedisOptions, RedisService};
//! use redkit_core::When;
//!
//! # async fn demo() -> redkit_core::RedkitResult<()> {
//! let service = RedisService::from_options(RedisOptions::new("localhost:6379"));
//! service.string_set("greeting", "hello", None, When::Always).await?;
//! let greeting: String = service.string_get("greeting").await?;
//! # Ok(())
//! # }
//! ```

mod hashes;
mod keys;
mod lists;
mod pubsub;
mod sets;
mod sorted_sets;
mod strings;
mod transaction;

pub use transaction::TransactionContext;

use std::sync::Arc;

use redis::{Cmd, FromRedisValue};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use redkit_core::{
    CommandFlags, JsonSerializer, RedkitError, RedkitResult, RoutedConnection, Serializer,
    require_key,
};

use crate::config::RedisOptions;
use crate::connection::{ConnectionProvider, Connector, MonitoredConnection, RedisConnector};

/// Typed façade over the shared connection
///
/// Cheap to clone; clones share the provider and the serializer.
pub struct RedisService<K: Connector = RedisConnector, S: Serializer = JsonSerializer> {
    provider: Arc<ConnectionProvider<K>>,
    serializer: Arc<S>,
    flags: Option<CommandFlags>,
    cancellation: Option<CancellationToken>,
}

impl<K: Connector, S: Serializer> Clone for RedisService<K, S> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            serializer: Arc::clone(&self.serializer),
            flags: self.flags,
            cancellation: self.cancellation.clone(),
        }
    }
}

impl RedisService<RedisConnector, JsonSerializer> {
    /// Service with JSON payloads over a `redis`-crate connection
    ///
    /// Nothing is opened until the first command.
    pub fn from_options(options: RedisOptions) -> Self {
        Self::new(ConnectionProvider::new(options))
    }
}

impl<K: Connector> RedisService<K, JsonSerializer> {
    /// Service with JSON payloads over the given provider
    pub fn new(provider: ConnectionProvider<K>) -> Self {
        Self::with_serializer(provider, JsonSerializer)
    }
}

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Service with a custom payload serializer
    pub fn with_serializer(provider: ConnectionProvider<K>, serializer: S) -> Self {
        Self {
            provider: Arc::new(provider),
            serializer: Arc::new(serializer),
            flags: None,
            cancellation: None,
        }
    }

    /// A view whose commands all use the given placement flag
    pub fn with_flags(&self, flags: CommandFlags) -> Self {
        Self {
            flags: Some(flags),
            ..self.clone()
        }
    }

    /// A view whose commands are not dispatched once the token is cancelled
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self.clone()
        }
    }

    pub fn provider(&self) -> &ConnectionProvider<K> {
        &self.provider
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    /// Placement override of this view, if any
    pub fn flags(&self) -> Option<CommandFlags> {
        self.flags
    }

    /// The shared connection routed for this view
    pub async fn connection(
        &self,
        default_flags: CommandFlags,
    ) -> RedkitResult<MonitoredConnection<K::Connection>> {
        let connection = self.provider.get_connection().await?;
        self.ensure_not_cancelled()?;
        Ok(connection.routed(self.flags.unwrap_or(default_flags)))
    }

    fn ensure_not_cancelled(&self) -> RedkitResult<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(RedkitError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd, default_flags: CommandFlags) -> RedkitResult<T> {
        self.ensure_not_cancelled()?;
        let mut connection = self.connection(default_flags).await?;
        Ok(cmd.query_async(&mut connection).await?)
    }

    /// Issue a read-only command
    pub(crate) async fn read<T: FromRedisValue>(&self, cmd: &Cmd) -> RedkitResult<T> {
        self.query(cmd, CommandFlags::READ).await
    }

    /// Issue a mutating command
    pub(crate) async fn write<T: FromRedisValue>(&self, cmd: &Cmd) -> RedkitResult<T> {
        self.query(cmd, CommandFlags::WRITE).await
    }

    pub(crate) fn encode<T: serde::Serialize + ?Sized>(&self, value: &T) -> RedkitResult<String> {
        self.serializer.serialize(value)
    }

    pub(crate) fn decode<T: DeserializeOwned + Default>(
        &self,
        payload: Option<String>,
    ) -> RedkitResult<T> {
        self.serializer.deserialize_opt(payload.as_deref())
    }

    pub(crate) fn decode_all<T: DeserializeOwned + Default>(
        &self,
        payloads: Vec<String>,
    ) -> RedkitResult<Vec<T>> {
        payloads
            .iter()
            .map(|payload| self.serializer.deserialize(payload))
            .collect()
    }
}

/// Fail when any key of a slice is empty
pub(crate) fn require_keys<Q: AsRef<str>>(name: &'static str, keys: &[Q]) -> RedkitResult<()> {
    keys.iter().try_for_each(|key| require_key(name, key.as_ref()))
}
