//! # Redkit Client
//!
//! Typed access to Redis over one shared multiplexed connection.
//!
//! ## Components
//!
//! - **[RedisOptions]**: configuration, bound from serde, `REDKIT_*` variables or builders
//! - **[ConnectionProvider]**: lazy, single creation of the shared connection
//! - **[MonitoredConnection]**: routing, command denylist and lifecycle events
//! - **[RedisService]**: typed commands for keys, strings, lists, sets, sorted sets,
//!   hashes and publishing, plus MULTI/EXEC transactions
//! - **[BlockingRedisService]**: the same façade for synchronous callers
//!
//! ## Feature Flags
//!
//! - `tls`: rustls support for `rediss://` endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use redkit_client::{ConnectionProvider, RedisOptions, RedisService};
//! use redkit_core::{EventObserver, HashSlotMove, When};
//!
//! struct LogObserver;
//!
//! impl EventObserver for LogObserver {
//!     fn hash_slot_moved(&self, moved: &HashSlotMove) {
//!         println!("slot {} moved to {}", moved.slot, moved.new_endpoint);
//!     }
//! }
//!
//! # async fn demo() -> redkit_core::RedkitResult<()> {
//! let options = RedisOptions::from_env()?;
//! let provider = ConnectionProvider::new(options).with_observer(Arc::new(LogObserver));
//! let redis = RedisService::new(provider);
//!
//! redis.hash_set("user:1", "name", "Ada", When::Always).await?;
//! let name: String = redis.hash_get("user:1", "name").await?;
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod config;
pub mod connection;
pub mod service;
pub mod settings;

pub use blocking::BlockingRedisService;
pub use config::{Protocol, Proxy, RedisOptions};
pub use connection::{
    ConnectionProvider, Connector, MonitoredConnection, RedisConnector, StoreConnection,
};
pub use service::{RedisService, TransactionContext};
pub use settings::{ConnectionSettings, Deployment, Endpoint};
