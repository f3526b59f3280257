//! Shared connection lifecycle
//!
//! - [`connector`]: opening store connections per deployment kind
//! - [`monitored`]: the handle that classifies command outcomes into events
//! - [`provider`]: lazy, single creation of the shared handle
//! - `health`: keep-alive probe and configuration-channel listener
//! - `dispatcher`: event delivery to the host observer

mod dispatcher;
mod health;

pub mod connector;
pub mod monitored;
pub mod provider;

pub use connector::{BroadcastStream, Connector, RedisConnector, StoreConnection};
pub use health::DISCONNECTED_PROBE_INTERVAL;
pub use monitored::{ADMIN_COMMANDS, MonitoredConnection};
pub use provider::{CONNECT_RETRY_DELAY, ConnectionProvider};
