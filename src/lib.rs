//! # redkit
//!
//! Typed Redis façade: values go in and out through a pluggable serializer,
//! one lazily created multiplexed connection is shared by every caller, and
//! its lifecycle is reported to an optional observer.
//!
//! This crate re-exports the workspace members:
//!
//! - [`redkit_core`]: errors, command options, expiry, paging, events, serialization
//! - [`redkit_client`]: configuration, connection provider, command façade, transactions

pub use redkit_client;
pub use redkit_core;

pub use redkit_client::{
    BlockingRedisService, ConnectionProvider, Connector, MonitoredConnection, Protocol, Proxy,
    RedisConnector, RedisOptions, RedisService, TransactionContext,
};
pub use redkit_core::{
    Aggregate, CommandFlags, ConnectionEvent, ConnectionFailure, EventObserver, Exclude, Expiry,
    FailureType, HashSlotMove, InternalError, JsonSerializer, KeyType, ListSide, Order,
    PageRange, RedkitError, RedkitResult, ScoreRange, Serializer, SetOperation, SortedSetEntry,
    When,
};
